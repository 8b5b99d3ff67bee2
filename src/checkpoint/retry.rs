//! Throttling retry with capped exponential backoff.
//!
//! Only [`CheckpointError::Throttled`] is retried; every other error is
//! returned to the caller on the first attempt.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::errors::{CheckpointError, CheckpointResult};
use crate::config::RetryConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: Option<u32>,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.backoff_multiplier,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: Option<u32>,
        initial_backoff: Duration,
        max_backoff: Duration,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            multiplier,
        }
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Delay before the attempt following `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let cap = self.max_backoff.as_secs_f64();
        if !delay.is_finite() || delay >= cap {
            self.max_backoff
        } else {
            Duration::from_secs_f64(delay.max(0.0))
        }
    }

    /// Run `operation`, retrying while the backing store reports throttling
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> CheckpointResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CheckpointResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_throttled() => {
                    if self.max_attempts.is_some_and(|max| attempt >= max) {
                        return Err(CheckpointError::RetriesExhausted {
                            operation: operation.to_string(),
                            attempts: attempt,
                            last_error: err.to_string(),
                        });
                    }
                    let delay = self.backoff_for(attempt);
                    warn!(
                        operation = %operation,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Checkpoint store throttled, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: Option<u32>) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(4),
            2.0,
        )
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = fast_policy(None);
        assert_eq!(policy.backoff_for(1), Duration::from_millis(1));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(2));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(4));
        assert_eq!(policy.backoff_for(10), Duration::from_millis(4));
        assert_eq!(policy.backoff_for(u32::MAX), Duration::from_millis(4));
    }

    #[tokio::test]
    async fn test_retries_throttling_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(None)
            .run("put_item", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(CheckpointError::throttled("put_item", "slow down"))
                } else {
                    Ok("stored")
                }
            })
            .await;

        assert_eq!(result, Ok("stored"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_does_not_retry_backend_errors() {
        let calls = AtomicU32::new(0);
        let result: CheckpointResult<()> = fast_policy(None)
            .run("put_item", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CheckpointError::backend("put_item", "table missing"))
            })
            .await;

        assert!(matches!(result, Err(CheckpointError::Backend { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_bound() {
        let calls = AtomicU32::new(0);
        let result: CheckpointResult<()> = fast_policy(Some(3))
            .run("put_item", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CheckpointError::throttled("put_item", "slow down"))
            })
            .await;

        assert!(matches!(
            result,
            Err(CheckpointError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
