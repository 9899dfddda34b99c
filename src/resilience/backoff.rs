//! Retry delays bounded by the time a call has left.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with up to 10% jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base: Duration::from_millis(base_ms),
            max: Duration::from_millis(max_ms.max(base_ms)),
        }
    }

    /// Unbounded delay after `failures` failed attempts.
    fn nominal(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(failures - 1);
        let delay = self.base.saturating_mul(factor).min(self.max);

        let jitter_ms = delay.as_millis() as u64 / 10;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    }

    /// Delay before the next attempt, or `None` when waiting it out would
    /// leave no time for that attempt.
    pub fn delay_within(&self, failures: u32, remaining: Duration) -> Option<Duration> {
        let delay = self.nominal(failures);
        (delay < remaining).then_some(delay)
    }
}
