//! Bounded retry with exponential backoff.
//!
//! The helper is stateless: every call starts from a fresh attempt counter and
//! nothing is shared between invocations. The delay before attempt `n + 1` is
//! `base_delay * 2^n`, computed by [`calculate_delay`].

use crate::ErrorExt;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total number of invocations, including the first one
    pub max_attempts: u32,
    /// Delay after the first failure; doubles for each later failure
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }
}

/// Delay to wait after the failed attempt with zero-based index `attempt`.
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    match 1u32.checked_shl(attempt) {
        Some(factor) => config
            .base_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX),
        None => Duration::MAX,
    }
}

/// Runs `operation` until it succeeds or `config.max_attempts` invocations
/// have failed, in which case the last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_when(config, operation_name, operation, |_| true).await
}

/// Like [`retry_with_backoff`], but gives up immediately when `should_retry`
/// rejects the error.
pub async fn retry_when<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    run_with_retry(config, operation_name, operation, |error| {
        should_retry(error).then_some(Duration::ZERO)
    })
    .await
}

/// Retries only errors that [`ErrorExt::is_retryable`] accepts and waits at
/// least as long as the error's [`ErrorExt::retry_after`] hint.
pub async fn retry_transient<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + ErrorExt,
{
    run_with_retry(config, operation_name, operation, |error| {
        error
            .is_retryable()
            .then(|| error.retry_after().unwrap_or_default())
    })
    .await
}

/// `min_delay` returns `None` to stop, or the shortest wait before the next
/// attempt.
async fn run_with_retry<F, Fut, T, E, D>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    min_delay: D,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    D: Fn(&E) -> Option<Duration>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(
                        "Operation {} succeeded after {} retries",
                        operation_name, attempt
                    );
                }
                return Ok(value);
            }
            Err(error) => {
                let hint = if attempt + 1 >= max_attempts {
                    None
                } else {
                    min_delay(&error)
                };
                let Some(hint) = hint else {
                    warn!(
                        "Operation {} failed after {} attempt(s): {}",
                        operation_name,
                        attempt + 1,
                        error
                    );
                    return Err(error);
                };

                let delay = calculate_delay(attempt, config).max(hint);
                debug!(
                    "Attempt {}/{} of {} failed, retrying in {:?}: {}",
                    attempt + 1,
                    max_attempts,
                    operation_name,
                    delay,
                    error
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CoreError, LlmError, RedditApiError};
    use std::time::Instant;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let config = RetryConfig::default();
        assert_eq!(calculate_delay(0, &config), Duration::from_millis(1000));
        assert_eq!(calculate_delay(1, &config), Duration::from_millis(2000));
        assert_eq!(calculate_delay(2, &config), Duration::from_millis(4000));
        assert_eq!(calculate_delay(3, &config), Duration::from_millis(8000));
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let config = RetryConfig::default();
        assert_eq!(calculate_delay(200, &config), Duration::MAX);
    }

    #[tokio::test]
    async fn test_succeeds_after_two_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_with_backoff(&fast_config(3), "flaky", move || {
            let counter = counter.clone();
            async move {
                let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if call < 3 {
                    Err(format!("failure {}", call))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_always_failing_operation_propagates_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), String> = retry_with_backoff(&fast_config(3), "broken", move || {
            let counter = counter.clone();
            async move {
                let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("failure {}", call))
            }
        })
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_invokes_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), &str> = retry_with_backoff(&fast_config(0), "once", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err("nope") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_when_stops_on_permanent_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), CoreError> = retry_when(
            &fast_config(3),
            "missing_subreddit",
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(CoreError::RedditApi(RedditApiError::SubredditNotFound {
                        subreddit: "nope".to_string(),
                    }))
                }
            },
            |error| error.is_retryable(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_transient_waits_for_retry_after_hint() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = Instant::now();

        let result: Result<u32, CoreError> = retry_transient(&fast_config(3), "rate_limited", move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded {
                        retry_after: 1,
                    }))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_retry_transient_skips_permanent_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), CoreError> = retry_transient(&fast_config(3), "bad_key", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CoreError::Llm(LlmError::InvalidApiKey {
                    provider: "openai".to_string(),
                }))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
