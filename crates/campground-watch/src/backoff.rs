use std::time::Duration;

use rand::Rng;

/// Exponential backoff for one watch's failing polls
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    jitter: bool,
    consecutive_failures: u32,
}

impl Backoff {
    /// Backoff starting at `initial` and capped at `max`
    pub fn new(initial: Duration, max: Duration, jitter: bool) -> Self {
        Self {
            initial,
            max,
            jitter,
            consecutive_failures: 0,
        }
    }

    /// Register a failure and return how long to wait before retrying.
    ///
    /// The delay doubles with every consecutive failure up to `max`. With
    /// jitter enabled the delay is drawn from the upper half of that value.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.consecutive_failures.min(20);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let delay = self.initial.saturating_mul(1 << exponent).min(self.max);
        if !self.jitter {
            return delay;
        }

        let half = delay / 2;
        let spread = u64::try_from(half.as_millis()).unwrap_or(u64::MAX);
        half + Duration::from_millis(rand::rng().random_range(0..=spread))
    }

    /// Forget previous failures after a successful poll
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Failures since the last success
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
