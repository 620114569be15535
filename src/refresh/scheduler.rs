//! Refresh scheduler: one cycle at startup, then one per period.
//!
//! Ticks fire on a fixed interval whether or not the previous cycle has
//! finished. Each tick's cycle runs as its own task, so a slow cycle never
//! stalls the schedule; overlapping cycles are tolerated unless
//! `skip_overlapping` is set.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info, warn};

use super::{CycleSummary, RefreshOrchestrator};
use crate::error::AdvisorError;

pub struct Scheduler {
    orchestrator: Arc<RefreshOrchestrator>,
    period: Duration,
    skip_overlapping: bool,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<RefreshOrchestrator>, period: Duration, skip_overlapping: bool) -> Self {
        Self {
            orchestrator,
            period,
            skip_overlapping,
        }
    }

    /// Run the startup cycle, then hand the periodic trigger to a background
    /// task. A listing failure during the startup cycle is returned.
    pub async fn start(self) -> Result<(CycleSummary, JoinHandle<()>), AdvisorError> {
        info!("📡 Initial refresh of trusted advisor checks...");
        let summary = self.orchestrator.run_cycle().await?;
        let handle = tokio::spawn(self.run_periodic());
        Ok((summary, handle))
    }

    /// Fire a cycle every `period`, forever.
    pub async fn run_periodic(self) {
        let mut interval = time::interval(self.period);
        interval.tick().await; // Skip the immediate tick (startup already ran)

        // Held by a running periodic cycle when overlap skipping is enabled.
        let running = Arc::new(Mutex::new(()));

        loop {
            interval.tick().await;

            let guard = if self.skip_overlapping {
                match Arc::clone(&running).try_lock_owned() {
                    Ok(guard) => Some(guard),
                    Err(_) => {
                        warn!("Previous refresh cycle still running, skipping this tick");
                        continue;
                    }
                }
            } else {
                None
            };

            let orchestrator = Arc::clone(&self.orchestrator);
            tokio::spawn(async move {
                info!("📡 Running scheduled refresh...");
                if let Err(e) = orchestrator.run_cycle().await {
                    error!("Cannot describe trusted advisor checks, skipping cycle: {}", e);
                }
                drop(guard);
            });
        }
    }
}
