//! Retry backoff policy for registry calls

use std::time::Duration;

/// Exponential backoff with a cap
#[derive(Clone, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub initial: Duration,
    /// Upper bound on any single delay
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            max: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the given retry attempt (zero-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.initial.as_millis() as u64;
        let exponential = 2u64.saturating_pow(attempt.min(16));
        let delay_ms = base
            .saturating_mul(exponential)
            .min(self.max.as_millis() as u64);
        Duration::from_millis(delay_ms)
    }
}
