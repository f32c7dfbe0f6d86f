//! Reconnect backoff policy.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Delay before the first reconnect attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound for any reconnect delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);

/// Largest cap a session accepts.
pub const MAX_DELAY_LIMIT: Duration = Duration::from_secs(24 * 60 * 60);

// ============================================================================
// Backoff
// ============================================================================

/// Deterministic exponential backoff without jitter.
///
/// `delay(attempt) = min(base * 2^attempt, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay for attempt 0.
    pub base: Duration,
    /// Cap applied to every delay.
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl Backoff {
    /// Creates a policy with the given base and cap.
    #[inline]
    #[must_use]
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Returns the wait before the reconnect following `attempt` failures.
    ///
    /// Doubles from `base` until the cap is reached, so the loop runs at
    /// most about 128 times regardless of `attempt`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let mut delay = self.base.min(self.max);
        if delay.is_zero() {
            return delay;
        }

        for _ in 0..attempt {
            if delay >= self.max {
                break;
            }
            delay = delay.saturating_mul(2);
        }
        delay.min(self.max)
    }
}

// ============================================================================
// Tests
// ============================================================================
