//! Convergence Poller
//!
//! Waits for workloads to reach their expected ready count. Status reads
//! that fail count as "not ready" ([`NOT_READY`]); only running out of time
//! fails a wait.

use crate::domain::model::ReadinessTarget;
use crate::domain::ports::{ClusterApiRef, WorkloadRef};
use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Default time between status reads
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound on a single readiness wait
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(180);

/// Observation recorded when a status read fails
pub const NOT_READY: i32 = -1;

/// Interval and timeout for a polled condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

/// A condition that was still unmet when the timeout elapsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTimeout<T> {
    /// Last value the probe returned
    pub last: T,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Probe until `predicate` accepts the value or `config.timeout` elapses.
///
/// The probe always runs at least once. Sleeps never overshoot the
/// deadline by more than one probe.
pub async fn poll_until<T, F, Fut, P>(
    description: &str,
    config: &PollConfig,
    mut probe: F,
    mut predicate: P,
) -> std::result::Result<T, PollTimeout<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
    P: FnMut(&T) -> bool,
    T: std::fmt::Debug,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let value = probe().await;

        if predicate(&value) {
            debug!(attempts, "{} satisfied", description);
            return Ok(value);
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            return Err(PollTimeout {
                last: value,
                attempts,
                elapsed,
            });
        }

        debug!(attempts, observed = ?value, "Waiting for {}", description);
        tokio::time::sleep(config.interval.min(config.timeout - elapsed)).await;
    }
}

/// Polls workload status until it converges
pub struct ConvergencePoller {
    api: ClusterApiRef,
    config: PollConfig,
}

impl ConvergencePoller {
    pub fn new(api: ClusterApiRef, config: PollConfig) -> Self {
        Self { api, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Current ready count, or [`NOT_READY`] if the read fails
    pub async fn observe(&self, workload: &WorkloadRef) -> i32 {
        match self.api.ready_count(workload).await {
            Ok(count) => count,
            Err(e) if e.is_transient() => {
                warn!(workload = %workload, error = %e, "Failed to read workload status");
                NOT_READY
            }
            Err(e) => {
                error!(workload = %workload, error = %e, "Unexpected workload status error");
                NOT_READY
            }
        }
    }

    /// Wait until the workload reports exactly the expected ready count
    pub async fn wait_ready(&self, target: &ReadinessTarget) -> Result<i32> {
        info!(
            workload = %target.workload,
            expected = target.expected,
            timeout = ?self.config.timeout,
            "Waiting for workload to become ready"
        );

        let description = target.workload.to_string();
        let result = poll_until(
            &description,
            &self.config,
            || self.observe(&target.workload),
            |count| *count == target.expected,
        )
        .await;

        match result {
            Ok(count) => {
                info!(workload = %target.workload, ready = count, "Workload ready");
                Ok(count)
            }
            Err(timeout) => Err(Error::ReadinessTimeout {
                workload: description,
                expected: target.expected,
                observed: timeout.last,
                timeout: self.config.timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCluster, Observation};
    use assert_matches::assert_matches;
    use std::sync::Arc;

    fn fast() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            timeout: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn test_poll_until_retries_until_satisfied() {
        let mut calls = 0;
        let value = poll_until(
            "counter",
            &fast(),
            || {
                calls += 1;
                let seen = calls;
                async move { seen }
            },
            |v| *v == 5,
        )
        .await
        .unwrap();

        assert_eq!(value, 5);
    }

    #[tokio::test]
    async fn test_poll_until_times_out_with_last_value() {
        let config = PollConfig {
            interval: Duration::from_millis(2),
            timeout: Duration::from_millis(20),
        };
        let timeout = poll_until("never", &config, || async { 1 }, |v| *v == 2)
            .await
            .unwrap_err();

        assert_eq!(timeout.last, 1);
        assert!(timeout.attempts > 1);
        assert!(timeout.elapsed >= config.timeout);
    }

    #[tokio::test]
    async fn test_poll_until_probes_at_least_once() {
        let config = PollConfig {
            interval: Duration::from_secs(1),
            timeout: Duration::ZERO,
        };
        let value = poll_until("immediate", &config, || async { 7 }, |v| *v == 7).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn test_failed_reads_do_not_abort() {
        let api = Arc::new(FakeCluster::with_nodes(vec![]).script(
            "mayastor",
            &[
                Observation::Unavailable,
                Observation::Unavailable,
                Observation::Count(0),
                Observation::Count(1),
                Observation::Count(2),
            ],
        ));
        let poller = ConvergencePoller::new(api.clone(), fast());
        let target = ReadinessTarget::new(WorkloadRef::daemon_set("mayastor", "mayastor"), 2);

        assert_eq!(poller.wait_ready(&target).await.unwrap(), 2);
        assert_eq!(api.status_calls(), 5);
    }

    #[tokio::test]
    async fn test_observe_sentinel() {
        let api = Arc::new(FakeCluster::with_nodes(vec![]));
        let poller = ConvergencePoller::new(api, fast());

        let count = poller
            .observe(&WorkloadRef::deployment("mayastor", "moac"))
            .await;
        assert_eq!(count, NOT_READY);
    }

    #[tokio::test]
    async fn test_non_transient_read_is_not_ready() {
        let api = Arc::new(FakeCluster::with_nodes(vec![]).script(
            "moac",
            &[Observation::Rejected, Observation::Unavailable, Observation::Count(1)],
        ));
        let poller = ConvergencePoller::new(api.clone(), fast());
        let workload = WorkloadRef::deployment("mayastor", "moac");

        assert_eq!(poller.observe(&workload).await, NOT_READY);
        assert_eq!(poller.observe(&workload).await, NOT_READY);
        assert_eq!(poller.observe(&workload).await, 1);
    }

    #[tokio::test]
    async fn test_overshoot_is_not_ready() {
        // Three available where two are expected never converges
        let api = Arc::new(
            FakeCluster::with_nodes(vec![]).script("mayastor", &[Observation::Count(3)]),
        );
        let config = PollConfig {
            interval: Duration::from_millis(1),
            timeout: Duration::from_millis(30),
        };
        let poller = ConvergencePoller::new(api, config);
        let target = ReadinessTarget::new(WorkloadRef::daemon_set("mayastor", "mayastor"), 2);

        let err = poller.wait_ready(&target).await.unwrap_err();
        assert_matches!(
            err,
            Error::ReadinessTimeout { expected: 2, observed: 3, .. }
        );
    }

    #[tokio::test]
    async fn test_sustained_failure_times_out() {
        let api = Arc::new(
            FakeCluster::with_nodes(vec![]).script("moac", &[Observation::Unavailable]),
        );
        let config = PollConfig {
            interval: Duration::from_millis(1),
            timeout: Duration::from_millis(30),
        };
        let poller = ConvergencePoller::new(api, config);
        let target = ReadinessTarget::new(WorkloadRef::deployment("mayastor", "moac"), 1);

        let err = poller.wait_ready(&target).await.unwrap_err();
        assert_matches!(err, Error::ReadinessTimeout { observed: NOT_READY, .. });
    }
}
