use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::cities::City;
use crate::models::RawPayload;
use crate::open_meteo::{AirQualitySource, FetchError};

/// Errors that tell whether another attempt could succeed.
pub trait Transient: std::fmt::Display {
    fn is_transient(&self) -> bool;
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        FetchError::is_transient(self)
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts made after the first one fails. Zero disables retrying.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum jitter to add to backoff delay (as fraction of delay, e.g., 0.25 = ±25%).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 0,
            base_delay_ms: 2000,
            jitter_factor: 0.25,
        }
    }
}

/// Run `func` until it succeeds, fails with a permanent error, or the retry
/// budget is spent. The last error is returned in the latter two cases.
pub async fn with_retry<F, Fut, T, E>(func: F, config: &RetryConfig) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient,
{
    let mut attempt = 0;
    loop {
        match func().await {
            Ok(result) => return Ok(result),
            Err(err) if err.is_transient() && attempt < config.max_retries => {
                log::warn!("Retryable error: {}", err);
                let delay = backoff_with_jitter(attempt, config);
                log::warn!(
                    "Retry attempt {}/{} after {:?}",
                    attempt + 1,
                    config.max_retries,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Calculate backoff delay with jitter for a given attempt.
///
/// Uses exponential backoff: base_delay * 2^attempt
/// Adds random jitter of ±jitter_factor to prevent thundering herd.
fn backoff_with_jitter(attempt: u32, config: &RetryConfig) -> Duration {
    let base_delay = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let jitter_range = (base_delay as f64 * config.jitter_factor) as u64;
    let jitter = rand::rng().random_range(0..=jitter_range * 2) as i64 - jitter_range as i64;
    let delay_ms = (base_delay as i64 + jitter).max(0) as u64;
    Duration::from_millis(delay_ms)
}

/// Retrying decorator around any air quality source.
pub struct Retrying<S> {
    inner: S,
    config: RetryConfig,
}

impl<S> Retrying<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<S: AirQualitySource> AirQualitySource for Retrying<S> {
    async fn fetch(&self, city: &City) -> Result<RawPayload, FetchError> {
        with_retry(|| self.inner.fetch(city), &self.config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        transient: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error (transient: {})", self.transient)
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_ms: 1,
            jitter_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(TestError { transient: true })
                } else {
                    Ok(n)
                }
            },
            &fast(3),
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError { transient: true })
            },
            &fast(2),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError { transient: false })
            },
            &fast(5),
        )
        .await;

        assert!(!result.unwrap_err().transient);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let calls = AtomicU32::new(0);
        let _: Result<(), _> = with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError { transient: true })
            },
            &RetryConfig::default(),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let config = RetryConfig {
            max_retries: 4,
            base_delay_ms: 100,
            jitter_factor: 0.0,
        };
        assert_eq!(backoff_with_jitter(0, &config), Duration::from_millis(100));
        assert_eq!(backoff_with_jitter(3, &config), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_jitter_stays_in_range() {
        let config = RetryConfig {
            max_retries: 4,
            base_delay_ms: 1000,
            jitter_factor: 0.25,
        };
        for _ in 0..50 {
            let delay = backoff_with_jitter(1, &config).as_millis();
            assert!((1500..=2500).contains(&delay), "delay {}", delay);
        }
    }

    struct FlakySource {
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl AirQualitySource for FlakySource {
        async fn fetch(&self, city: &City) -> Result<RawPayload, FetchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(FetchError::HttpStatus {
                    city: city.name.clone(),
                    status: reqwest::StatusCode::BAD_GATEWAY,
                });
            }
            Ok(RawPayload::new(city.name.clone(), serde_json::json!({})))
        }
    }

    #[tokio::test]
    async fn test_retrying_source_wraps_transparently() {
        let source = Retrying::new(
            FlakySource {
                calls: AtomicU32::new(0),
                failures: 1,
            },
            fast(1),
        );

        let raw = source.fetch(&City::new("Mombasa", -4.0435, 39.6682)).await;
        assert_eq!(raw.unwrap().city, "Mombasa");
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 2);
    }
}
