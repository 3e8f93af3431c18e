//! Cycle-level exponential backoff.

use std::time::Duration;

/// Backoff state: consecutive failures so far and the delay they produced.
///
/// The nth consecutive failure waits `base * 2^(n-1)`, never more than
/// `cap`. A successful cycle resets the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    attempt: u32,
    current_delay: Duration,
    base: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Backoff {
            attempt: 0,
            current_delay: Duration::ZERO,
            base,
            cap: cap.max(base),
        }
    }

    /// Record a failure and return how long to wait before the next cycle.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        let exponent = (self.attempt - 1).min(31);
        let factor = 1u32 << exponent;
        self.current_delay = self
            .base
            .checked_mul(factor)
            .map_or(self.cap, |d| d.min(self.cap));
        self.current_delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_delay = Duration::ZERO;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }
}
