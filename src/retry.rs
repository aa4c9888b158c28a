use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Fixed-delay retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including initial attempt)
    pub max_attempts: u32,
    /// Delay between two attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Every attempt failed
#[derive(Debug, Clone, PartialEq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Retry an async operation a bounded number of times with a fixed pause.
///
/// Every error is retried; the operation is called exactly
/// `config.max_attempts` times when it never succeeds.
pub async fn retry_fixed<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start_time = Instant::now();
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempts = attempt,
                        duration_ms = start_time.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if attempt < max_attempts => {
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %err,
                    "Attempt failed, retrying in {}ms",
                    config.delay.as_millis()
                );
                sleep(config.delay).await;
            }
            Err(err) => {
                warn!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %err,
                    "All retry attempts exhausted"
                );
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(3, Duration::from_secs(3));
        let start = Instant::now();
        let counter = &calls;

        let result = retry_fixed("test", &config, || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("boom")
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(3, Duration::from_millis(100));

        let counter = &calls;

        let result: Result<(), _> = retry_fixed("test", &config, || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("always")
        })
        .await;

        assert_eq!(
            result,
            Err(RetryExhausted {
                attempts: 3,
                last_error: "always"
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryConfig::new(0, Duration::ZERO).max_attempts, 1);
    }
}
