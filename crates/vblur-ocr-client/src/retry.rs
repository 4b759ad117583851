//! Retry policy with capped exponential backoff.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::OcrResult;
use crate::metrics::record_retry;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_parse("OCR_MAX_RETRIES", defaults.max_retries),
            base_delay_ms: env_parse("OCR_RETRY_BASE_MS", defaults.base_delay_ms),
            max_delay_ms: env_parse("OCR_RETRY_MAX_MS", defaults.max_delay_ms),
        }
    }

    /// No retries; used by tests.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(exp.min(self.max_delay_ms))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Execute an async operation, retrying network errors, 429 and 5xx.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, op: F) -> OcrResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = OcrResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = config.delay(attempt);
                warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "OCR request failed, retrying: {}",
                    e
                );
                record_retry();
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrClientError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 500,
        };
        assert_eq!(config.delay(0), Duration::from_millis(100));
        assert_eq!(config.delay(2), Duration::from_millis(400));
        assert_eq!(config.delay(10), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 1,
        };
        let attempts = AtomicU32::new(0);

        let result = with_retry(&config, || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(OcrClientError::Http {
                    status: 503,
                    body: "busy".into(),
                })
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_client_errors() {
        let attempts = AtomicU32::new(0);

        let result: OcrResult<()> = with_retry(&RetryConfig::default(), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(OcrClientError::Http {
                status: 400,
                body: "bad image".into(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
