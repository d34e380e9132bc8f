//! Error recovery and retry mechanisms for client operations
//!
//! This module provides the single retry policy used by call setup and the
//! media hand-off. Only errors reporting [`ClientError::is_recoverable`]
//! are retried; everything else returns immediately.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::error::{ClientError, ClientResult};

/// Configuration for retry behavior
///
/// # Examples
///
/// ```rust
/// use livecall_client_core::client::recovery::RetryConfig;
/// use std::time::Duration;
///
/// let config = RetryConfig::default();
/// assert_eq!(config.max_attempts, 3);
///
/// let custom = RetryConfig {
///     max_attempts: 5,
///     initial_delay: Duration::from_millis(200),
///     max_delay: Duration::from_secs(10),
///     backoff_multiplier: 1.5,
///     use_jitter: false,
/// };
/// assert!(custom.max_attempts > config.max_attempts);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Configuration for quick retries (signaling requests during setup)
    pub fn quick() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 1.5,
            use_jitter: true,
        }
    }

    /// A single retry after a short pause (media publish verification)
    pub fn single() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_millis(250),
            backoff_multiplier: 1.0,
            use_jitter: false,
        }
    }
}

/// Retry an operation with exponential backoff
///
/// Executes `operation` until it succeeds, fails with a non-recoverable
/// error, or exhausts `config.max_attempts`. Recoverability is decided by
/// [`ClientError::is_recoverable`]; cancellations are never retried.
///
/// # Examples
///
/// ```rust
/// use livecall_client_core::client::recovery::{retry_with_backoff, RetryConfig};
/// use livecall_client_core::{ClientError, ClientResult};
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let attempts = AtomicU32::new(0);
/// let attempts = &attempts;
/// let result = retry_with_backoff("flaky_request", RetryConfig::quick(), || async move {
///     if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
///         Err(ClientError::ConnectionTimeout)
///     } else {
///         Ok("done")
///     }
/// })
/// .await?;
/// assert_eq!(result, "done");
/// assert_eq!(attempts.load(Ordering::SeqCst), 3);
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_backoff<T, F, Fut>(
    operation_name: &str,
    config: RetryConfig,
    mut operation: F,
) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

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
                        "Operation succeeded after retries"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_recoverable() && attempt < config.max_attempts => {
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %e,
                    category = e.category(),
                    next_delay_ms = delay.as_millis() as u64,
                    "Recoverable error, will retry"
                );

                let actual_delay = if config.use_jitter {
                    let jitter = (rand::random::<f64>() - 0.5) * 0.2; // ±10% jitter
                    let millis = delay.as_millis() as f64;
                    Duration::from_millis((millis * (1.0 + jitter)) as u64)
                } else {
                    delay
                };

                sleep(actual_delay).await;

                let next_delay_ms = (delay.as_millis() as f64 * config.backoff_multiplier) as u64;
                delay = Duration::from_millis(next_delay_ms).min(config.max_delay);
            }
            Err(e) => {
                if attempt >= config.max_attempts {
                    error!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %e,
                        "Operation failed after all retry attempts"
                    );
                } else {
                    debug!(
                        operation = operation_name,
                        error = %e,
                        category = e.category(),
                        "Non-recoverable error, not retrying"
                    );
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn non_recoverable_errors_fail_fast() {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let result: ClientResult<()> =
            retry_with_backoff("auth_request", RetryConfig::quick(), || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::AuthenticationRequired { reason: "401".into() })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let result: ClientResult<()> =
            retry_with_backoff("cancelled_request", RetryConfig::quick(), || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::OperationCancelled)
            })
            .await;

        assert_eq!(result.unwrap_err(), ClientError::OperationCancelled);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_on_persistent_transient_errors() {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
            use_jitter: false,
        };
        let result: ClientResult<()> =
            retry_with_backoff("down_backend", config, || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::ConnectionTimeout)
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
