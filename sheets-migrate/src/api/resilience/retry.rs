//! Retry with exponential backoff
//!
//! After failed attempt `n` (counted from 0) the policy waits
//! `base_delay * backoff_multiplier^n`, capped at `max_delay`. With the
//! defaults that is 200ms, then 400ms, for three attempts in total.

use log::{debug, warn};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Errors that know whether another attempt could succeed
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no waiting
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay after failed attempt `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let millis = self.base_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts. The last error is returned.
    pub async fn execute<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        E: RetryableError + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{} succeeded after {} retries", label, attempt);
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.config.delay_for_attempt(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        label,
                        attempt + 1,
                        max_attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
