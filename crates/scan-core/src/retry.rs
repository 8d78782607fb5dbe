//! Bounded-retry policy for transient hardware faults.
//!
//! Transient flakiness (a stalled motor, a busy digitizer) is the dominant
//! real-world failure mode of a long mechanical sweep, so a recoverable
//! fault retries the affected point a bounded number of times before the
//! point is written off as failed and the scan moves on.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Defines how often a scan point is attempted before it is marked failed.
///
/// Uses a constant backoff between attempts.
///
/// # Example
///
/// ```
/// use scan_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy {
///     max_attempts: 5,
///     backoff_delay: Duration::from_millis(200),
/// };
/// assert!(policy.attempts_left(4));
/// assert!(!policy.attempts_left(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per point, including the first. A point that faults on
    /// `max_attempts` consecutive attempts is recorded as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts.
    #[serde(default = "default_backoff_delay", with = "humantime_serde")]
    pub backoff_delay: Duration,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_delay() -> Duration {
    Duration::from_millis(250)
}

impl RetryPolicy {
    /// Whether another attempt is permitted after `attempts` have been made.
    pub fn attempts_left(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    /// Three attempts per point with 250 ms between them.
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_delay: default_backoff_delay(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_attempts_left() {
        let policy = RetryPolicy {
            max_attempts: 1,
            backoff_delay: Duration::ZERO,
        };
        assert!(policy.attempts_left(0));
        assert!(!policy.attempts_left(1));
    }
}
