//! Retry orchestration
//!
//! Drives extra attempts of a test whose first attempt failed.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::policy::RetryPolicy;
use crate::models::{UnitTestOutcome, UnitTestResult};

/// Outcome sets of every retry attempt, in order
#[derive(Clone, Debug, Default)]
pub struct RetryResult {
    attempts: Vec<Vec<UnitTestResult>>,
}

impl RetryResult {
    pub fn attempts(&self) -> &[Vec<UnitTestResult>] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// The set that decides the final outcome
    pub fn final_set(&self) -> Option<&[UnitTestResult]> {
        self.attempts.last().map(Vec::as_slice)
    }

    /// Aggregate outcome of each attempt, in order
    pub fn outcomes(&self) -> Vec<UnitTestOutcome> {
        self.attempts
            .iter()
            .map(|set| UnitTestOutcome::aggregate(set.iter().map(|r| r.outcome)))
            .collect()
    }

    pub fn into_attempts(self) -> Vec<Vec<UnitTestResult>> {
        self.attempts
    }
}

/// Whether an attempt's outcomes stop the retry loop
pub fn is_acceptable(outcomes: &[UnitTestResult]) -> bool {
    !outcomes.iter().any(|r| r.outcome.needs_retry())
}

/// Re-runs a test according to its retry policy
pub struct RetryOrchestrator {
    policy: RetryPolicy,
}

impl RetryOrchestrator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run up to `max_retry_attempts` attempts, waiting before each one.
    ///
    /// `attempt` receives the 1-based retry number. A fired cancellation
    /// during a wait ends the loop with the attempts made so far.
    pub async fn execute<F, Fut>(&self, mut attempt: F, cancel: &CancellationToken) -> RetryResult
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Vec<UnitTestResult>>,
    {
        let mut result = RetryResult::default();
        let mut delay = self.policy.delay();

        for retry in 1..=self.policy.max_retry_attempts() {
            debug!(retry, delay_ms = delay.as_millis() as u64, "waiting before retry");
            if !wait(delay, cancel).await {
                info!(retry, "retry cancelled");
                break;
            }
            delay = self.policy.next_delay(delay);

            let outcomes = attempt(retry).await;
            let acceptable = is_acceptable(&outcomes);
            result.attempts.push(outcomes);

            if acceptable {
                debug!(retry, "retry attempt accepted");
                break;
            }
        }

        result
    }
}

async fn wait(delay: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = cancel.cancelled() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureInfo;
    use crate::retry::BackoffKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn failing() -> Vec<UnitTestResult> {
        vec![UnitTestResult::failed(
            UnitTestOutcome::Failed,
            FailureInfo::new("nope"),
        )]
    }

    #[tokio::test]
    async fn test_passes_on_third_retry() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), BackoffKind::Constant).unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result = RetryOrchestrator::new(policy)
            .execute(
                |_| {
                    let calls = calls.clone();
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                            failing()
                        } else {
                            vec![UnitTestResult::passed()]
                        }
                    }
                },
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.len(), 3);
        assert_eq!(
            result.final_set().unwrap()[0].outcome,
            UnitTestOutcome::Passed
        );
        assert_eq!(
            result.outcomes(),
            vec![
                UnitTestOutcome::Failed,
                UnitTestOutcome::Failed,
                UnitTestOutcome::Passed
            ]
        );
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_stops_at_max_attempts() {
        let policy = RetryPolicy::new(2, Duration::ZERO, BackoffKind::Constant).unwrap();
        let result = RetryOrchestrator::new(policy)
            .execute(|_| async { failing() }, &CancellationToken::new())
            .await;

        assert_eq!(result.len(), 2);
        assert!(!is_acceptable(result.final_set().unwrap()));
    }

    #[tokio::test]
    async fn test_inconclusive_is_acceptable() {
        let policy = RetryPolicy::new(5, Duration::ZERO, BackoffKind::Constant).unwrap();
        let result = RetryOrchestrator::new(policy)
            .execute(
                |_| async { vec![UnitTestResult::new(UnitTestOutcome::Inconclusive)] },
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn test_exponential_backoff_waits_longer() {
        let policy =
            RetryPolicy::new(3, Duration::from_millis(10), BackoffKind::Exponential).unwrap();
        let start = Instant::now();
        let result = RetryOrchestrator::new(policy)
            .execute(|_| async { failing() }, &CancellationToken::new())
            .await;

        assert_eq!(result.len(), 3);
        // 10 + 20 + 40
        assert!(start.elapsed() >= Duration::from_millis(70));
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_wait() {
        let policy = RetryPolicy::new(3, Duration::from_secs(30), BackoffKind::Constant).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = RetryOrchestrator::new(policy)
            .execute(|_| async { failing() }, &cancel)
            .await;

        assert!(result.is_empty());
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
