//! Retry logic.
//!
//! # Responsibilities
//! - Re-invoke a failed operation up to `max_retries` more times
//! - Sleep `base * 2^attempt + jitter` between attempts
//! - Surface the last error unchanged once the budget is used up
//!
//! # Design Decisions
//! - A successful attempt returns immediately, no delay on the happy path
//! - Sleeps are Tokio timers, so other tasks keep running during backoff
//! - No overall deadline; wrapped operations enforce their own timeouts
//! - Every error is retryable by default; `retry_if` narrows that

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Retries after the first attempt when nothing else is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Base backoff delay when nothing else is configured.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound of the jitter added to each backoff delay.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(500);

/// Bounded exponential-backoff retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_jitter(&self) -> Duration {
        self.max_jitter
    }

    /// Run `operation`, retrying every failure.
    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.retry_if(operation, |_| true).await
    }

    /// Run `operation`, retrying only failures accepted by `should_retry`.
    ///
    /// A rejected error is returned at once, unchanged.
    pub async fn retry_if<T, E, F, Fut, P>(&self, mut operation: F, mut should_retry: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(&E) -> bool,
        E: Display,
    {
        let mut attempt = 0u32;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if attempt >= self.max_retries {
                if self.max_retries > 0 {
                    metrics::record_retry_exhausted();
                    tracing::warn!(attempts = attempt + 1, error = %error, "Retries exhausted");
                }
                return Err(error);
            }

            if !should_retry(&error) {
                tracing::debug!(attempt = attempt + 1, error = %error, "Error not retryable");
                return Err(error);
            }

            let delay = calculate_backoff(attempt, self.base_delay, self.max_jitter);
            tracing::warn!(
                attempt = attempt + 1,
                max_retries = self.max_retries,
                delay = ?delay,
                error = %error,
                "Operation failed, retrying"
            );
            metrics::record_retry_attempt();
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Invoke `operation`, retrying up to `max_retries` times with exponential
/// backoff from `base_delay`. Returns the last error unchanged.
pub async fn retry_async<T, E, F, Fut>(operation: F, max_retries: u32, base_delay: Duration) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryPolicy::new(max_retries, base_delay).run(operation).await
}
