//! Exponential reconnect backoff.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff: `initial * 2^attempt`, capped at `max`, with up to
/// `jitter` of the delay added at random so several connections dropped at
/// once do not reconnect in lockstep.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    jitter: f64,
    attempt: u32,
}

impl ExponentialBackoff {
    pub const DEFAULT_INITIAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_MAX: Duration = Duration::from_secs(60);

    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            jitter: 0.2,
            attempt: 0,
        }
    }

    /// Set the jitter fraction, clamped to `0.0..=1.0`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before the next attempt, without jitter.
    pub fn base_delay(&self) -> Duration {
        calculate_retry_delay(self.initial, self.max, self.attempt)
    }

    /// Delay before the next attempt. Advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay();
        self.attempt = self.attempt.saturating_add(1);
        if self.jitter <= 0.0 {
            return base;
        }
        let extra = base.mul_f64(rand::rng().random_range(0.0..=self.jitter));
        (base + extra).min(self.max)
    }

    /// Start over after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INITIAL, Self::DEFAULT_MAX)
    }
}

/// Calculate the retry delay for a given attempt.
///
/// Uses exponential backoff: `initial * 2^attempt`, capped at `max`.
pub fn calculate_retry_delay(initial: Duration, max: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(31));
    initial.saturating_mul(factor).min(max)
}
