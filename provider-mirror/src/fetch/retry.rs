//! Retry policy for transient download failures.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use provider_mirror::fetch::RetryPolicy;
//!
//! let policy = RetryPolicy::exponential(3);
//! assert_eq!(policy.delay_after(1), Some(Duration::from_millis(100)));
//! assert_eq!(policy.delay_after(2), Some(Duration::from_millis(200)));
//! assert_eq!(policy.delay_after(3), None); // attempts exhausted
//! ```

use std::time::Duration;

/// Default initial delay for exponential backoff (100ms).
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;

/// Default maximum delay for exponential backoff (30 seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default number of attempts per archive, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How many times, and how patiently, a transient failure is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,
    /// Delay after the first failure.
    initial_delay: Duration,
    /// Cap applied to every delay.
    max_delay: Duration,
    /// Growth factor between consecutive delays.
    multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// A single attempt; failures are never retried.
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Exponential backoff with the default delays.
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Constant delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
        }
    }

    /// Override the initial and maximum delays.
    pub fn with_delays(mut self, initial_delay: Duration, max_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.max_delay = max_delay.max(initial_delay);
        self
    }

    /// Maximum number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after `attempt` (1-based) failed, or `None` when no
    /// attempts remain.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        let factor = self.multiplier.powi(attempt as i32 - 1);
        let delay_ms = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Some(Duration::from_millis(delay_ms as u64))
    }
}
