use crate::error::{CoreError, NetworkError};
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(15),
        }
    }
}

impl RetryConfig {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    pub fn from_secs(attempts: u32, delay_seconds: u64) -> Self {
        Self::new(attempts, Duration::from_secs(delay_seconds))
    }

    /// Single attempt, no pause.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

/// Runs `operation` until it succeeds, fails permanently, or runs out of
/// attempts. Failures are classified with [`is_retryable`].
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry_if(config, operation_name, is_retryable, operation).await
}

/// Same as [`with_retry`] with a caller-supplied classifier.
pub async fn with_retry_if<T, F, Fut, C>(
    config: &RetryConfig,
    operation_name: &str,
    classify: C,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
    C: Fn(&anyhow::Error) -> bool,
{
    let max_attempts = config.max_attempts();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                if !classify(&e) {
                    debug!(
                        "{} failed with a permanent error on attempt {}: {:#}",
                        operation_name, attempt, e
                    );
                    return Err(e);
                }

                if attempt >= max_attempts {
                    warn!(
                        "{} failed permanently after {} attempts",
                        operation_name, max_attempts
                    );
                    return Err(e.context(format!(
                        "{} failed after {} attempts",
                        operation_name, max_attempts
                    )));
                }

                warn!(
                    "{} failed (attempt {}/{}): {:#}. Retrying in {:?}...",
                    operation_name, attempt, max_attempts, e, config.delay
                );
                tokio::time::sleep(config.delay).await;
                attempt += 1;
            }
        }
    }
}

const RETRYABLE_PATTERNS: [&str; 13] = [
    "internal error",
    "internal_error",
    "server error",
    "server_error",
    "network error",
    "network_error",
    "timed out",
    "timeout",
    "error sending request",
    "connection reset",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
];

/// Transient infrastructure faults (5xx, timeouts, dropped connections,
/// node "internal error" replies) are retryable; everything else is not.
pub fn is_retryable(error: &anyhow::Error) -> bool {
    for cause in error.chain() {
        if let Some(net) = cause.downcast_ref::<NetworkError>() {
            return net.is_transient();
        }
        if let Some(core) = cause.downcast_ref::<CoreError>() {
            return matches!(core, CoreError::Network(net) if net.is_transient());
        }
    }

    let error_msg = format!("{:#}", error).to_lowercase();
    RETRYABLE_PATTERNS
        .iter()
        .any(|pattern| error_msg.contains(pattern))
}
