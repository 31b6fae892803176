//! Bounded exponential-backoff retry
//!
//! Only errors the caller classifies as retryable are retried. When attempts
//! run out, or a non-retryable error occurs, the original error is returned
//! unchanged.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry attempt bound and backoff curve
///
/// The wait after failed attempt `n` is `multiplier * 2^(n-1)` seconds,
/// clamped to `[initial_delay_secs, max_delay_secs]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Lower bound on any wait, in seconds
    pub initial_delay_secs: f64,
    /// Scale of the exponential curve
    pub multiplier: f64,
    /// Upper bound on any wait, in seconds
    pub max_delay_secs: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_secs: 1.0,
            multiplier: 1.0,
            max_delay_secs: 4.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits, for tests and local tooling
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_secs: 0.0,
            multiplier: 0.0,
            max_delay_secs: 0.0,
        }
    }

    /// Wait after failed attempt `attempt` (1-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let raw = self.multiplier * 2f64.powi(exponent);
        let secs = raw.min(self.max_delay_secs).max(self.initial_delay_secs).max(0.0);
        Duration::from_secs_f64(secs)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// exhausts the attempt bound
    ///
    /// `op` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the error from the last attempt.
    pub fn run<T, E, F>(&self, is_retryable: impl Fn(&E) -> bool, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && is_retryable(&err) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "rate limited, retrying"
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
