//! Explicit retry-with-backoff wrapper for contended operations.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use walletcore_common::{constants, LedgerError, Result};

/// Retry policy for transient lock contention.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per top-level operation, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Delay multiplier applied after each failed attempt.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::MAX_RETRY_ATTEMPTS,
            base_delay: constants::retry_base_delay(),
            multiplier: constants::RETRY_BACKOFF_MULTIPLIER,
        }
    }
}

/// Run `f` up to `policy.max_attempts` times, sleeping with exponential
/// backoff between attempts.
///
/// Only errors for which [`LedgerError::is_retryable`] holds are retried;
/// every other error surfaces immediately. Each retry is a fresh attempt,
/// since no partial state survives a failed one. Exhausting the attempt
/// budget on a retryable error surfaces as [`LedgerError::Conflict`].
///
/// Invoked once per top-level operation, never nested.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = policy.base_delay;

    for attempt in 1..=policy.max_attempts {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient lock contention, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= policy.multiplier;
            }
            Err(err) if err.is_retryable() => {
                warn!(
                    operation,
                    attempts = policy.max_attempts,
                    error = %err,
                    "retry budget exhausted"
                );
                return Err(LedgerError::Conflict {
                    attempts: policy.max_attempts,
                });
            }
            Err(err) => return Err(err),
        }
    }

    Err(LedgerError::Internal(format!(
        "retry loop for {operation} ran zero attempts"
    )))
}
