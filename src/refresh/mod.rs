//! Refresh orchestrator: one full cycle over every listed check.
//!
//! Lists checks, prunes series of checks that disappeared upstream, then
//! drains the check list through a fixed-size pool of workers. A cycle is
//! complete only once every worker has returned.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

use crate::advisor::{AdvisorApi, Check};
use crate::error::AdvisorError;
use crate::metrics::CheckGauges;

pub mod check;
pub mod scheduler;

use check::{CheckOutcome, CheckRefresher, RetryPolicy};

/// Totals for one completed cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleSummary {
    pub checks: usize,
    pub updated: usize,
    pub abandoned: usize,
    pub pruned: usize,
    pub elapsed: Duration,
}

pub struct RefreshOrchestrator {
    api: Arc<dyn AdvisorApi>,
    gauges: CheckGauges,
    refresher: Arc<CheckRefresher>,
    concurrency: usize,
}

impl RefreshOrchestrator {
    pub fn new(
        api: Arc<dyn AdvisorApi>,
        gauges: CheckGauges,
        concurrency: usize,
        retry: RetryPolicy,
    ) -> Self {
        let refresher = Arc::new(CheckRefresher::new(
            Arc::clone(&api),
            gauges.clone(),
            retry,
        ));
        Self {
            api,
            gauges,
            refresher,
            concurrency: concurrency.max(1),
        }
    }

    /// Run one full cycle. Fails only if the check listing fails.
    pub async fn run_cycle(&self) -> Result<CycleSummary, AdvisorError> {
        info!("📡 Refreshing trusted advisor checks and statuses");
        let started = Instant::now();

        let checks = self.api.list_checks().await?;

        // An overlapping older cycle may still re-export a check pruned here;
        // the next listing removes it again.
        let pruned = self.gauges.retain_checks(&checks);
        if pruned > 0 {
            info!(pruned, "Removed series of checks no longer listed");
        }

        let total = checks.len();
        let workers = self.concurrency.min(total);
        info!(checks = total, workers, "Refreshing checks");

        let (tx, rx) = mpsc::unbounded_channel::<Check>();
        for check in checks {
            // The receiver is alive until the workers are spawned below.
            let _ = tx.send(check);
        }
        drop(tx);
        let queue = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let refresher = Arc::clone(&self.refresher);
            handles.push(tokio::spawn(async move {
                let mut updated = 0;
                let mut abandoned = 0;
                loop {
                    let next = queue.lock().await.recv().await;
                    let Some(check) = next else { break };

                    debug!(
                        worker,
                        check_id = %check.id,
                        check = %check.name,
                        category = %check.category,
                        "Worker refreshing check"
                    );
                    match refresher.refresh(&check).await {
                        CheckOutcome::Updated { status, value } => {
                            debug!(worker, check_id = %check.id, %status, value, "Check gauge updated");
                            updated += 1;
                        }
                        CheckOutcome::Abandoned => abandoned += 1,
                    }
                }
                (updated, abandoned)
            }));
        }

        let mut summary = CycleSummary {
            checks: total,
            pruned,
            ..CycleSummary::default()
        };
        for handle in handles {
            match handle.await {
                Ok((updated, abandoned)) => {
                    summary.updated += updated;
                    summary.abandoned += abandoned;
                }
                Err(e) => error!("Refresh worker panicked: {}", e),
            }
        }
        summary.elapsed = started.elapsed();

        info!(
            checks = summary.checks,
            updated = summary.updated,
            abandoned = summary.abandoned,
            pruned = summary.pruned,
            series = self.gauges.samples().len(),
            duration_ms = summary.elapsed.as_millis() as u64,
            "📡 Refresh cycle complete"
        );

        Ok(summary)
    }
}
