use std::time::Duration;

/// Bounded exponential backoff: attempt `i` (from 0) waits `base_delay * 2^i` after a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one call.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Sum of every backoff delay when all attempts fail transiently.
    pub fn worst_case_delay(&self) -> Duration {
        (0..self.max_attempts).fold(Duration::ZERO, |total, attempt| {
            total.saturating_add(self.delay_for(attempt))
        })
    }
}
