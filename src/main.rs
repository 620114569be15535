//! AWS Trusted Advisor exporter.
//!
//! Polls every Trusted Advisor check on a fixed schedule and republishes
//! the latest result of each as the `aws_trusted_advisor_check` gauge,
//! labelled by check id, name, category and status.
//!
//! Startup:
//! - configuration is read from flags / environment (fatal if malformed)
//! - one full refresh runs before the listener starts (fatal if the
//!   checks cannot be listed)
//! - later refreshes run in the background every REFRESH_PERIOD seconds

use anyhow::{Context, Result};
use clap::Parser;
use prometheus::Registry;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod advisor;
mod config;
mod error;
mod metrics;
mod refresh;
mod server;

use advisor::support::SupportAdvisor;
use advisor::AdvisorApi;
use config::{Args, Config, LogFormat};
use metrics::CheckGauges;
use refresh::scheduler::Scheduler;
use refresh::RefreshOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_args(Args::parse()).context("Invalid configuration")?;
    init_tracing(config.log_format);

    info!("Trusted Advisor exporter v{} starting up", env!("CARGO_PKG_VERSION"));
    info!(
        listen_addr = %config.listen_addr,
        refresh_period_secs = config.refresh_period.as_secs(),
        concurrency = config.concurrency,
        call_timeout_secs = config.retry.call_timeout.map(|d| d.as_secs()),
        skip_overlapping = config.skip_overlapping,
        "Configuration loaded"
    );

    // ── Advisory API ────────────────────────────────────────────────
    let api: Arc<dyn AdvisorApi> = Arc::new(SupportAdvisor::from_env().await);

    // ── Metrics ─────────────────────────────────────────────────────
    let registry = Registry::new();
    let gauges = CheckGauges::register(&registry).context("Failed to register check gauge")?;

    // ── Refresh Pipeline ────────────────────────────────────────────
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        Arc::clone(&api),
        gauges.clone(),
        config.concurrency,
        config.retry,
    ));
    let scheduler = Scheduler::new(orchestrator, config.refresh_period, config.skip_overlapping);
    let (_, refresh_task) = scheduler
        .start()
        .await
        .context("Cannot describe trusted advisor checks")?;

    // ── Scrape Endpoint ─────────────────────────────────────────────
    let served = server::serve(config.listen_addr, gauges, shutdown_signal()).await;
    refresh_task.abort();
    served.context("Metrics listener failed")?;

    info!("Trusted Advisor exporter stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "trusted_advisor_exporter=info,tower_http=info".into());

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler, keep serving until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
