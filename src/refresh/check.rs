//! Per-check refresh: fetch with bounded retry, then reconcile the gauge.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::advisor::{AdvisorApi, Check, CheckResult, CheckStatus};
use crate::error::AdvisorError;
use crate::metrics::{CheckGauges, CheckLabels};

/// Maximum number of attempts per check and cycle.
const MAX_ATTEMPTS: u32 = 3;

/// Retry schedule for result fetches.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Linear step: the wait after attempt `n` is `n * backoff`.
    pub backoff: Duration,
    /// Optional deadline for each individual call.
    pub call_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff: Duration::from_secs(1),
            call_timeout: None,
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// What happened to one check in one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CheckOutcome {
    Updated { status: CheckStatus, value: f64 },
    /// Fetch failed; the previously exported value was left in place.
    Abandoned,
}

pub struct CheckRefresher {
    api: Arc<dyn AdvisorApi>,
    gauges: CheckGauges,
    retry: RetryPolicy,
}

impl CheckRefresher {
    pub fn new(api: Arc<dyn AdvisorApi>, gauges: CheckGauges, retry: RetryPolicy) -> Self {
        Self { api, gauges, retry }
    }

    /// Refresh one check. Never fails from the caller's point of view.
    pub async fn refresh(&self, check: &Check) -> CheckOutcome {
        match self.fetch(check).await {
            Ok(result) => {
                let value = result.magnitude();
                self.reconcile(check, result.status, value);
                CheckOutcome::Updated { status: result.status, value }
            }
            Err(e) => {
                warn!(
                    check_id = %check.id,
                    check = %check.name,
                    "Cannot describe check result, keeping previous value: {}", e
                );
                CheckOutcome::Abandoned
            }
        }
    }

    async fn fetch(&self, check: &Check) -> Result<CheckResult, AdvisorError> {
        let mut attempt = 1;
        loop {
            let err = match self.call(&check.id).await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            warn!(
                check_id = %check.id,
                check = %check.name,
                attempt,
                max_attempts = self.retry.max_attempts,
                "Error refreshing check: {}", err
            );

            if !err.is_retryable() || attempt >= self.retry.max_attempts {
                return Err(err);
            }

            tokio::time::sleep(self.retry.delay_after(attempt)).await;
            attempt += 1;
        }
    }

    async fn call(&self, check_id: &str) -> Result<CheckResult, AdvisorError> {
        match self.retry.call_timeout {
            Some(limit) => tokio::time::timeout(limit, self.api.check_result(check_id))
                .await
                .map_err(|_| AdvisorError::Timeout(limit))?,
            None => self.api.check_result(check_id).await,
        }
    }

    /// Clear every status of this check, then set the current one.
    fn reconcile(&self, check: &Check, status: CheckStatus, value: f64) {
        for stale in CheckStatus::ALL {
            self.gauges.clear(&CheckLabels::for_check(check, stale));
        }
        self.gauges.set(&CheckLabels::for_check(check, status), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::fake::{result, FakeAdvisor};
    use prometheus::Registry;
    use std::sync::atomic::Ordering;
    use tokio::time::Instant;

    fn setup(fake: &Arc<FakeAdvisor>) -> (CheckRefresher, CheckGauges) {
        let gauges = CheckGauges::register(&Registry::new()).unwrap();
        let api: Arc<dyn AdvisorApi> = fake.clone();
        let refresher = CheckRefresher::new(api, gauges.clone(), RetryPolicy::default());
        (refresher, gauges)
    }

    fn check_a() -> Check {
        Check::new("A", "Check A", "cost_optimizing")
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_one_status_after_refresh() {
        let fake = Arc::new(FakeAdvisor::new());
        fake.respond("A", result(CheckStatus::Error, Some(3)));
        let (refresher, gauges) = setup(&fake);

        let outcome = refresher.refresh(&check_a()).await;
        assert_eq!(outcome, CheckOutcome::Updated { status: CheckStatus::Error, value: 3.0 });

        let samples = gauges.samples_for("A");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].0.status, CheckStatus::Error);
        assert_eq!(samples[0].1, 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_change_removes_stale_tuple() {
        let fake = Arc::new(FakeAdvisor::new());
        fake.respond("A", result(CheckStatus::Warning, Some(8)));
        fake.respond("A", result(CheckStatus::Ok, Some(0)));
        let (refresher, gauges) = setup(&fake);

        refresher.refresh(&check_a()).await;
        assert_eq!(gauges.samples_for("A")[0].0.status, CheckStatus::Warning);

        refresher.refresh(&check_a()).await;
        let samples = gauges.samples_for("A");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].0.status, CheckStatus::Ok);
        assert_eq!(samples[0].1, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_keeps_prior_value() {
        let fake = Arc::new(FakeAdvisor::new());
        fake.respond("A", result(CheckStatus::Warning, Some(8)));
        fake.respond("A", Err(AdvisorError::Api("throttled".into())));
        let (refresher, gauges) = setup(&fake);

        refresher.refresh(&check_a()).await;
        let before = gauges.samples_for("A");

        let started = Instant::now();
        let outcome = refresher.refresh(&check_a()).await;
        assert_eq!(outcome, CheckOutcome::Abandoned);
        assert_eq!(fake.result_calls(), 4);
        // 1s + 2s between the three attempts, nothing after the last one.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(gauges.samples_for("A"), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_then_success() {
        let fake = Arc::new(FakeAdvisor::new());
        fake.respond("A", Err(AdvisorError::Api("throttled".into())));
        fake.respond("A", result(CheckStatus::NotAvailable, None));
        let (refresher, gauges) = setup(&fake);

        let started = Instant::now();
        let outcome = refresher.refresh(&check_a()).await;
        assert_eq!(
            outcome,
            CheckOutcome::Updated { status: CheckStatus::NotAvailable, value: 0.0 }
        );
        assert_eq!(fake.result_calls(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert_eq!(gauges.samples_for("A").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_abandons_immediately() {
        let fake = Arc::new(FakeAdvisor::new());
        fake.respond("A", Err(AdvisorError::UnknownStatus("purple".into())));
        let (refresher, gauges) = setup(&fake);

        let started = Instant::now();
        assert_eq!(refresher.refresh(&check_a()).await, CheckOutcome::Abandoned);
        assert_eq!(fake.result_calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(gauges.samples().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_counts_as_failed_attempt() {
        let fake = Arc::new(FakeAdvisor::new());
        fake.respond("A", result(CheckStatus::Ok, Some(0)));
        fake.set_result_delay(Duration::from_secs(30));
        let gauges = CheckGauges::register(&Registry::new()).unwrap();
        let retry = RetryPolicy {
            call_timeout: Some(Duration::from_secs(5)),
            ..RetryPolicy::default()
        };
        let api: Arc<dyn AdvisorApi> = fake.clone();
        let refresher = CheckRefresher::new(api, gauges.clone(), retry);

        assert_eq!(refresher.refresh(&check_a()).await, CheckOutcome::Abandoned);
        assert_eq!(fake.result_calls(), 3);
        // Attempts are sequential; a cancelled call is no longer in flight.
        assert_eq!(fake.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(gauges.samples().is_empty());
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
    }
}
