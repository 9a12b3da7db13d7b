//! Exponential backoff with decorrelation jitter for SSE reconnect attempts.
//!
//! One [`BackoffPolicy`] belongs to exactly one [`crate::client::StreamClient`].
//! Earlier designs in this lineage shared a single, process-wide attempt
//! counter across clients; that was a bug. Each client now owns its own
//! policy instance, so independent streams never perturb each other's
//! backoff schedule.

use std::time::Duration;

/// Exponential backoff with decorrelation jitter, per the reconnect policy
/// in this crate's specification.
///
/// For attempt index `n` (zero-based), `cap = min(max_delay, initial_delay * 2^n)`.
/// The returned delay is uniformly distributed in `[cap/2, cap)`: it doubles
/// in expectation per attempt and never exceeds `max_delay`.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    attempt: u32,
}

impl BackoffPolicy {
    /// Build a policy with the given initial and maximum delays. `max_delay`
    /// is raised to `initial_delay` if it was configured smaller.
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        let max_delay = max_delay.max(initial_delay);
        Self {
            initial_delay,
            max_delay,
            attempt: 0,
        }
    }

    /// Returns the delay to sleep before the next connect attempt, and
    /// advances the internal attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let cap = self.cap_for_attempt(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        if cap.is_zero() {
            return Duration::ZERO;
        }

        let cap_nanos = cap.as_nanos().min(u64::MAX as u128) as u64;
        let half = cap_nanos / 2;
        let jitter = if half == 0 { 0 } else { fastrand::u64(0..half) };
        Duration::from_nanos(half + jitter)
    }

    /// Resets the attempt counter to zero, as if no attempts had been made.
    /// Called by the stream client once a connection has stayed `Open` for
    /// at least `backoff_reset_threshold`.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Replaces the base delay used in the exponential formula, keeping the
    /// current attempt count. Invoked when the server sends a `retry:`
    /// directive.
    pub fn set_base_delay(&mut self, delay: Duration) {
        self.initial_delay = delay;
        self.max_delay = self.max_delay.max(delay);
    }

    fn cap_for_attempt(&self, attempt: u32) -> Duration {
        let scale = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let scaled = self.initial_delay.as_nanos().saturating_mul(scale as u128);
        let capped = scaled.min(self.max_delay.as_nanos());
        Duration::from_nanos(capped.min(u64::MAX as u128) as u64)
    }
}
