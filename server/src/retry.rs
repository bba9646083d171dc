//! Bounded retry with exponential backoff and jitter for idempotent
//! provider requests.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

/// Distinguishes failures worth retrying (network hiccups, 5xx) from failures
/// that will not improve with another attempt (4xx, malformed payloads).
pub enum RetryError<E> {
    Retryable(E),
    NonRetryable(E),
}

pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for exponential backoff.
    pub base_delay_ms: u64,
    /// Jitter added to each delay, as a fraction (0.25 = plus/minus 25%).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 500,
            jitter_factor: 0.25,
        }
    }
}

/// Run `func` until it succeeds, fails non-retryably, or attempts run out.
/// The last error is returned either way.
pub async fn with_retry<F, Fut, T, E>(func: F, config: &RetryConfig) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, RetryError<E>>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match func().await {
            Ok(result) => return Ok(result),
            Err(RetryError::NonRetryable(err)) => return Err(err),
            Err(RetryError::Retryable(err)) => {
                attempt += 1;
                if attempt >= config.max_attempts {
                    return Err(err);
                }
                let delay = backoff_with_jitter(attempt - 1, config);
                log::warn!(
                    "retryable provider error: {} (attempt {}/{}, backing off {:?})",
                    err,
                    attempt,
                    config.max_attempts,
                    delay
                );
                sleep(delay).await;
            }
        }
    }
}

/// Exponential backoff: base * 2^attempt, with random jitter to avoid
/// synchronized retries.
fn backoff_with_jitter(attempt: u32, config: &RetryConfig) -> Duration {
    let base = config.base_delay_ms.saturating_mul(2u64.pow(attempt));
    let jitter_range = (base as f64 * config.jitter_factor) as i64;
    let jitter = if jitter_range > 0 {
        rand::rng().random_range(-jitter_range..=jitter_range)
    } else {
        0
    };
    Duration::from_millis((base as i64 + jitter).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<u32, String> = with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            },
            &RetryConfig::default(),
        )
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<u32, String> = with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RetryError::NonRetryable("bad request".to_string()))
            },
            &RetryConfig::default(),
        )
        .await;
        assert_eq!(result, Err("bad request".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_attempts_run_out() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            jitter_factor: 0.0,
        };
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<u32, String> = with_retry(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RetryError::Retryable("flaky".to_string()))
            },
            &config,
        )
        .await;
        assert_eq!(result, Err("flaky".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn eventually_succeeds_after_retries() {
        let config = RetryConfig {
            max_attempts: 4,
            base_delay_ms: 1,
            jitter_factor: 0.0,
        };
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<u32, String> = with_retry(
            || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(RetryError::Retryable("flaky".to_string()))
                } else {
                    Ok(n)
                }
            },
            &config,
        )
        .await;
        assert_eq!(result, Ok(2));
    }
}
