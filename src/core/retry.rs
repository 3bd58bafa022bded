//! Retry logic for outbound provider calls.
//!
//! Per-recipient sends get a small fixed budget: a handful of attempts with
//! a short constant delay, then the failure is final and counted. Retrying
//! is reserved for transient transport conditions; provider-side rejections
//! like "bot was blocked by the user" are not going to succeed on attempt
//! two and are surfaced immediately.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Retry-related errors.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All attempts exhausted
    #[error("Max attempts ({max_attempts}) exhausted")]
    Exhausted { max_attempts: u32, last_error: E },
}

/// Retry strategy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts (first try included)
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::core::config::retry::MAX_ATTEMPTS,
            delay: crate::core::config::retry::delay(),
        }
    }
}

impl RetryConfig {
    /// Creates a retry config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total attempt budget.
    #[must_use]
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Sets the fixed inter-attempt delay.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Determines if an error is worth another attempt.
pub trait Retryable {
    /// Returns true if the error should be retried.
    fn is_retryable(&self) -> bool;
}

impl Retryable for std::io::Error {
    fn is_retryable(&self) -> bool {
        use std::io::ErrorKind;
        matches!(
            self.kind(),
            ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::TimedOut
                | ErrorKind::Interrupted
                | ErrorKind::WouldBlock
        )
    }
}

/// Executes an async operation with the configured attempt budget.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation` - The async operation to execute
///
/// # Returns
/// The successful value, or `RetryError::Exhausted` carrying the last error.
pub async fn retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Debug,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempts < config.max_attempts && e.is_retryable() => {
                log::warn!(
                    "Attempt {}/{} failed (retrying in {:?}): {:?}",
                    attempts,
                    config.max_attempts,
                    config.delay,
                    e
                );
                tokio::time::sleep(config.delay).await;
            }
            Err(e) => {
                return Err(RetryError::Exhausted {
                    max_attempts: config.max_attempts,
                    last_error: e,
                });
            }
        }
    }
}
