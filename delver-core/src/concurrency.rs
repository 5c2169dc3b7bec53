//! Async utilities and concurrency control
//!
//! Provides the shared counting limiter that bounds in-flight external calls
//! across the whole research tree, plus timeout and retry helpers.

use crate::error::{DelverError, DelverResult, ErrorContext};
use crate::config_error;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, warn};

/// Retry configuration
///
/// The default is a single attempt: transient provider errors fail the
/// branch that raised them rather than being retried. Bounded retry is an
/// explicit opt-in through configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (1 means no retries)
    pub max_attempts: usize,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier (exponential backoff)
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Bounded retry with the given number of attempts
    pub fn with_attempts(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }
}

/// Retry an async operation with exponential backoff
pub async fn retry_async<F, T, E>(
    operation: F,
    config: RetryConfig,
    operation_name: &str,
) -> Result<T, E>
where
    F: Fn() -> BoxFuture<'static, Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay_ms;

    loop {
        attempt += 1;

        debug!(
            operation = operation_name,
            attempt = attempt,
            max_attempts = config.max_attempts,
            "Attempting operation"
        );

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if attempt >= config.max_attempts {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        error = %err,
                        "Operation failed after all attempts"
                    );
                    return Err(err);
                }

                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %err,
                    delay_ms = delay,
                    "Operation failed, retrying"
                );

                let actual_delay = if config.jitter {
                    let jitter_factor = 0.1;
                    let jitter = (fastrand::f64() - 0.5) * 2.0 * jitter_factor;
                    ((delay as f64) * (1.0 + jitter)) as u64
                } else {
                    delay
                };

                sleep(Duration::from_millis(actual_delay)).await;

                delay = ((delay as f64) * config.backoff_multiplier) as u64;
                delay = delay.min(config.max_delay_ms);
            }
        }
    }
}

/// Timeout wrapper for async operations
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, operation_name: &str) -> DelverResult<T>
where
    F: std::future::Future<Output = T>,
{
    match timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(DelverError::Timeout {
            operation: operation_name.to_string(),
            duration_ms: timeout_ms,
            context: ErrorContext::new("concurrency")
                .with_operation("with_timeout")
                .with_metadata("timeout_ms", &timeout_ms.to_string())
                .with_suggestion("Increase the timeout duration")
                .with_suggestion("Check network connectivity and service availability"),
        }),
    }
}

/// Counting limiter bounding concurrent external calls tree-wide
///
/// The limiter's counter is the only shared mutable resource in a research
/// invocation. Every external search and generation call acquires a permit
/// before starting, regardless of which recursion level issued it.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    permits: Arc<tokio::sync::Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting at most `max_in_flight` concurrent calls
    pub fn new(max_in_flight: usize) -> DelverResult<Self> {
        if max_in_flight == 0 {
            return Err(config_error!(
                "Concurrency limit must be greater than 0",
                "concurrency"
            ));
        }
        Ok(Self {
            permits: Arc::new(tokio::sync::Semaphore::new(max_in_flight)),
            capacity: max_in_flight,
        })
    }

    /// Acquire a permit, waiting until one is available
    pub async fn acquire(&self) -> DelverResult<ConcurrencyGuard> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| DelverError::Internal {
                message: format!("Failed to acquire concurrency permit: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("concurrency").with_operation("acquire"),
            })?;

        Ok(ConcurrencyGuard { _permit: permit })
    }

    /// Maximum number of permits this limiter admits
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently available
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// RAII guard releasing its permit on drop
pub struct ConcurrencyGuard {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn zero_capacity_is_a_config_error() {
        assert!(ConcurrencyLimiter::new(0).is_err());
        assert!(ConcurrencyLimiter::new(1).is_ok());
    }

    #[tokio::test]
    async fn limiter_bounds_in_flight_work() {
        let limiter = ConcurrencyLimiter::new(2).unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let _guard = limiter.acquire().await.unwrap();
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(10)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn with_timeout_passes_fast_futures_through() {
        let value = with_timeout(async { 42 }, 1000, "fast").await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn with_timeout_reports_slow_futures() {
        let result = with_timeout(sleep(Duration::from_millis(200)), 10, "slow").await;
        assert!(matches!(result, Err(DelverError::Timeout { .. })));
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<(), std::io::Error> = retry_async(
            move || {
                let counter = Arc::clone(&counter);
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(std::io::Error::other("always fails"))
                })
            },
            RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 1,
                jitter: false,
                ..RetryConfig::default()
            },
            "always_fails",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
