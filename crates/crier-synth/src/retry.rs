//! Bounded-attempt backoff policy.

use std::time::Duration;

use rand::Rng;

/// Retry policy for transient synthesis failures.
///
/// Delay before attempt `n` is `base_delay * 2^(n-1)`, capped at
/// `max_delay`, then scaled by a uniform jitter factor in `[0.5, 1.5)` so
/// that many channels backing off together do not hammer the service in
/// lockstep.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of backend calls per synthesis request.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on the pre-jitter delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Computes the jittered delay before retry attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let raw = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);

        let jitter: f64 = rand::thread_rng().gen_range(0.5..1.5);
        raw.mul_f64(jitter)
    }
}
