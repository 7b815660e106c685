//! Retry logic with configurable backoff
//!
//! This module provides the per-item retry policy for transient failures.
//! The delay between attempts starts at `initial_delay` and is multiplied by
//! `backoff_multiplier` after each failure (capped at `max_delay`), with optional
//! jitter. The default configuration is a fixed 2 second delay and 3 attempts.
//!
//! # Example
//!
//! ```no_run
//! use invoice_batch::retry::{IsRetryable, with_retry};
//! use invoice_batch::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let result = with_retry(&config, |_attempt| async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::ExtractionError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transport failures (network errors, non-success statuses, undecodable envelopes)
/// should return `true`. Missing inputs and unparsable results should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ExtractionError {
    fn is_retryable(&self) -> bool {
        match self {
            ExtractionError::Transport { .. }
            | ExtractionError::HttpStatus { .. }
            | ExtractionError::MalformedResponse { .. } => true,
            // The document is gone; another attempt cannot bring it back
            ExtractionError::NotFound { .. } => false,
            // Parse failures end the task
            ExtractionError::Parse { .. } => false,
            // Cleanup runs after the retry loop and is never retried
            ExtractionError::Cleanup { .. } => false,
        }
    }
}

/// Execute an async operation with retry
///
/// `operation` receives the 1-based attempt number. It is called at most
/// `config.max_attempts` times (at least once, even when `max_attempts` is 0).
/// Non-retryable errors are returned immediately.
///
/// # Returns
///
/// Returns the successful result or the last error after all attempts are exhausted.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 1;
    let mut delay = config.initial_delay;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tokio::time::sleep(jittered_delay).await;

                delay = next_delay(delay, config);
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Grow `delay` by the backoff multiplier, capped at `max_delay`
///
/// A product that is not a representable duration (overflow, NaN) saturates to
/// `max_delay`.
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
