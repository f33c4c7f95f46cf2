//! Bounded retry with exponential backoff for retryable step kinds.
//!
//! The policy is built from the step's own `max_retries`/`retry_delay`
//! fields, so per-step configuration is honored rather than a single
//! wrapper-wide default. Validation and security failures are never
//! re-attempted; the caller supplies the retryability predicate.

use std::future::Future;
use std::time::Duration;

use crate::models::WorkflowStep;

/// Attempt budget and backoff shape for one step.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (must be >= 1).
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per attempt after that.
    pub initial_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn for_step(step: &WorkflowStep) -> Self {
        Self {
            max_attempts: step.max_retries.max(1),
            initial_delay: Duration::from_secs_f64(step.retry_delay.max(0.0)),
            max_delay: Duration::from_secs(30),
        }
    }

    fn delay_for(&self, completed_attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(completed_attempts.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds, the error is not retryable, or the attempt
/// budget is exhausted. Sleeps between attempts per the policy.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_retryable(&err) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "Attempt {}/{} failed: {}; retrying in {:?}",
                    attempt,
                    policy.max_attempts,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::error::ToolError;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&policy(3), ToolError::is_retryable, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ToolError::Execution("flaky".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&policy(2), ToolError::is_retryable, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ToolError::Execution("still down".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&policy(5), ToolError::is_retryable, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ToolError::Security("blocked".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(p.delay_for(1), Duration::from_secs(1));
        assert_eq!(p.delay_for(2), Duration::from_secs(2));
        assert_eq!(p.delay_for(3), Duration::from_secs(4));
        assert_eq!(p.delay_for(4), Duration::from_secs(5));
    }
}
