//! Throttled, retrying executor for network calls.
//!
//! Every outbound call of a run goes through one shared [`RequestExecutor`]:
//! the throttle bounds the call rate, and transient transport failures are
//! retried with exponential backoff before surfacing as a terminal error.

use std::future::Future;
use std::time::Duration;

use log::warn;

use crate::errors::{FetchError, RetryClass};
use crate::throttle::{SlidingWindowThrottle, ThrottleConfig, ThrottleStats};

/// Retry configuration: up to `max_attempts` invocations, backing off
/// `base_delay * 2^(attempt-1)` between them.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        // attempt is 1-based; the delay after attempt N is base * 2^(N-1).
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Executes caller-supplied network operations under the run's throttle and
/// retry policy.
///
/// Safe to share across concurrent workers: the throttle serializes window
/// accounting internally and the executor itself is stateless.
pub struct RequestExecutor {
    throttle: SlidingWindowThrottle,
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(throttle_config: ThrottleConfig, policy: RetryPolicy) -> Self {
        Self {
            throttle: SlidingWindowThrottle::new(throttle_config),
            policy,
        }
    }

    /// Runs `op` under the throttle, retrying transient failures.
    ///
    /// Each attempt claims its own throttle slot. A failure classified
    /// [`RetryClass::Retry`] is retried until `max_attempts` is reached,
    /// logging one warning per retried attempt; exhaustion yields
    /// [`FetchError::RetryExhausted`] wrapping the last error. Errors
    /// classified [`RetryClass::Never`] propagate immediately.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, FetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.throttle.acquire().await;

            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.retry_class() == RetryClass::Retry => {
                    if attempt == max_attempts {
                        return Err(FetchError::RetryExhausted {
                            attempts: max_attempts,
                            source: Box::new(err),
                        });
                    }
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        "Transient fetch failure (attempt {}/{}), retrying in {:?}: {}",
                        attempt, max_attempts, delay, err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }

        // max_attempts >= 1, so the loop always returns.
        unreachable!("retry loop exited without a result")
    }

    /// Snapshot of the underlying throttle counters.
    pub fn throttle_stats(&self) -> ThrottleStats {
        self.throttle.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_executor(max_attempts: u32) -> RequestExecutor {
        RequestExecutor::new(
            ThrottleConfig {
                max_calls: 100,
                period: Duration::from_secs(1),
            },
            RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(10),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_passes_through() {
        let executor = fast_executor(3);
        let result: Result<u32, FetchError> = executor.execute(|| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried_until_success() {
        let executor = fast_executor(3);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in = calls.clone();
        let result = executor
            .execute(move || {
                let calls = calls_in.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 1 {
                        Err(FetchError::Timeout {
                            url: "https://api.example.com".to_string(),
                        })
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_invokes_exactly_max_attempts() {
        let executor = fast_executor(3);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in = calls.clone();
        let result: Result<(), FetchError> = executor
            .execute(move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(FetchError::Request {
                        message: "connection reset".to_string(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(FetchError::RetryExhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, FetchError::Request { .. }));
            }
            other => panic!("expected RetryExhausted, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_propagates_without_retry() {
        let executor = fast_executor(3);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in = calls.clone();
        let result: Result<(), FetchError> = executor
            .execute(move || {
                let calls = calls_in.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(FetchError::InvalidRequest {
                        message: "empty endpoint".to_string(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(FetchError::InvalidRequest { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }
}
