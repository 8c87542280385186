use std::future::Future;
use std::time::Duration;

use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{error, info, warn};

use crate::risk::RiskError;

/// Retry configuration for store calls
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// No retries; the first failure is returned.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Execute a store operation, retrying only while it reports `StoreUnavailable`.
pub async fn retry_with_backoff<F, Fut, T>(
    operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> Result<T, RiskError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RiskError>>,
{
    let retry_strategy = ExponentialBackoff::from_millis(config.initial_delay.as_millis().max(1) as u64)
        .max_delay(config.max_delay)
        .map(jitter)
        .take(config.max_retries);

    let result = RetryIf::spawn(retry_strategy, operation, |e: &RiskError| {
        let retryable = matches!(e, RiskError::StoreUnavailable { .. });
        if retryable {
            warn!(operation = %operation_name, error = %e, "Store operation failed, will retry");
        }
        retryable
    })
    .await;

    if let Err(e) = &result {
        error!(operation = %operation_name, error = %e, "Store operation failed after retries");
    }

    result
}

/// Run a future under a timeout, mapping expiry to `DetectorTimeout`.
pub async fn with_timeout<F, T>(future: F, timeout: Duration, pattern: &str) -> Result<T, RiskError>
where
    F: Future<Output = Result<T, RiskError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => {
            info!(pattern = %pattern, timeout_ms = timeout.as_millis() as u64, "Operation timed out");
            Err(RiskError::DetectorTimeout {
                pattern: pattern.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_with_backoff_success() {
        let counter = Arc::new(AtomicUsize::new(0));
        let config = RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };

        let result = retry_with_backoff(
            || {
                let counter = counter.clone();
                async move {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        Err(RiskError::store("postgres", "temporary failure"))
                    } else {
                        Ok("Success".to_string())
                    }
                }
            },
            &config,
            "test_operation",
        )
        .await;

        assert_eq!(result.unwrap(), "Success");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_store_errors_are_not_retried() {
        let counter = Arc::new(AtomicUsize::new(0));

        let result: Result<(), RiskError> = retry_with_backoff(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(RiskError::CompanyNotFound { company_id: "x".into() })
                }
            },
            &RetryConfig::default(),
            "test_operation",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_wrapper() {
        let result = with_timeout(
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<String, RiskError>("Success".to_string())
            },
            Duration::from_millis(10),
            "circular_investment",
        )
        .await;

        assert!(matches!(result, Err(RiskError::DetectorTimeout { .. })));
    }
}
