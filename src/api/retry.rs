//! Retry with exponential backoff for upstream API calls
//!
//! Provides resilient API calls that automatically retry on transient failures
//! with exponential backoff and jitter.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Upper bound (exclusive) of the random jitter fraction
pub const DEFAULT_MAX_JITTER: f64 = 0.3;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,

    /// Delay before the first retry, doubled on each further attempt
    pub base_delay: Duration,

    /// Cap applied after jitter
    pub max_delay: Duration,

    /// Jitter fraction is drawn uniformly from `[0, max_jitter)`
    pub max_jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryConfig {
    /// Create a config for quick retries (short backoff)
    pub fn quick() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(20),
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    /// Calculate backoff duration for a given attempt (0-indexed)
    ///
    /// `min(max_delay, base_delay * 2^attempt * (1 + jitter))`
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let jitter = if self.max_jitter > 0.0 {
            rand::thread_rng().gen_range(0.0..self.max_jitter)
        } else {
            0.0
        };
        self.backoff_with_jitter(attempt, jitter)
    }

    fn backoff_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let base = self.base_delay.as_secs_f64() * 2f64.powi(attempt.min(62) as i32);
        let delayed = base * (1.0 + jitter);
        Duration::from_secs_f64(delayed.min(self.max_delay.as_secs_f64()))
    }
}

/// Retry classification for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation
    Retry,
    /// Don't retry, the error is permanent
    NoRetry,
}

/// Trait for errors that can indicate whether to retry
pub trait RetryableError {
    /// Determine if this error should be retried
    fn retry_decision(&self) -> RetryDecision;
}

/// Execute an async operation with retry logic
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation_name` - Name for logging purposes
/// * `operation` - The async operation to execute
///
/// # Returns
/// The result of the operation, or the last error if all retries failed
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => match e.retry_decision() {
                RetryDecision::NoRetry => {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation failed with non-retryable error: {}",
                        e
                    );
                    return Err(e);
                }
                RetryDecision::Retry => {
                    if attempt >= config.max_retries {
                        warn!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Operation failed after {} attempts: {}",
                            attempt + 1,
                            e
                        );
                        return Err(e);
                    }

                    let backoff = config.backoff_duration(attempt);

                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_attempts = config.max_retries + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        "Retrying after error: {}",
                        e
                    );

                    sleep(backoff).await;
                    attempt += 1;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_without_jitter() {
        let config = RetryConfig {
            max_jitter: 0.0,
            ..Default::default()
        };

        assert_eq!(config.backoff_duration(0), Duration::from_millis(1000));
        assert_eq!(config.backoff_duration(1), Duration::from_millis(2000));
        assert_eq!(config.backoff_duration(2), Duration::from_millis(4000));
        assert_eq!(config.backoff_duration(3), Duration::from_millis(8000));
        assert_eq!(config.backoff_duration(4), Duration::from_millis(10_000)); // Capped
        assert_eq!(config.backoff_duration(40), Duration::from_millis(10_000));
    }

    #[test]
    fn test_backoff_bounds_with_jitter() {
        let config = RetryConfig::default();

        for attempt in 0..6u32 {
            let floor = config.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
            let lower = floor.min(config.max_delay.as_secs_f64());
            let upper = (floor * 1.3).min(config.max_delay.as_secs_f64());

            for _ in 0..50 {
                let backoff = config.backoff_duration(attempt).as_secs_f64();
                assert!(backoff >= lower - 1e-9, "attempt {}: {} < {}", attempt, backoff, lower);
                assert!(backoff <= upper + 1e-9, "attempt {}: {} > {}", attempt, backoff, upper);
            }
        }
    }

    #[test]
    fn test_jitter_is_applied_before_cap() {
        let config = RetryConfig::default();
        // 8s * 1.29 would exceed the 10s cap
        assert_eq!(
            config.backoff_with_jitter(3, 0.29),
            Duration::from_millis(10_000)
        );
        assert_eq!(
            config.backoff_with_jitter(1, 0.25),
            Duration::from_millis(2500)
        );
    }

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "TestError(retryable={})", self.retryable)
        }
    }

    impl RetryableError for TestError {
        fn retry_decision(&self) -> RetryDecision {
            if self.retryable {
                RetryDecision::Retry
            } else {
                RetryDecision::NoRetry
            }
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let config = RetryConfig::quick();
        let mut attempts = 0;

        let result: Result<&str, TestError> = with_retry(&config, "test", || {
            attempts += 1;
            async move {
                if attempts < 3 {
                    Err(TestError { retryable: true })
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            ..Default::default()
        };
        let mut attempts = 0;

        let result: Result<&str, TestError> = with_retry(&config, "test", || {
            attempts += 1;
            async move { Err(TestError { retryable: true }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3); // Initial + 2 retries
    }

    #[tokio::test]
    async fn test_no_retry_on_permanent_error() {
        let config = RetryConfig::quick();
        let mut attempts = 0;

        let result: Result<&str, TestError> = with_retry(&config, "test", || {
            attempts += 1;
            async move { Err(TestError { retryable: false }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1); // No retries
    }
}
