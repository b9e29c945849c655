//! Reconnect backoff.
//!
//! Binary exponential backoff: `delay = initial * 2^(attempt - 1)`, capped
//! at the configured maximum, plus additive jitter drawn uniformly from
//! `[0, delay * jitter]`. The cap is applied after jitter, so consecutive
//! delays are non-decreasing until the cap and constant afterwards.

use crate::SessionConfig;
use rand::Rng;
use std::time::Duration;

/// Reconnect backoff state for one session.
#[derive(Debug)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    jitter: f64,
    attempt: u32,
}

impl Backoff {
    /// Create backoff state from the session configuration.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            initial: config.initial_backoff,
            max: config.max_backoff,
            jitter: config.backoff_jitter.clamp(0.0, 1.0),
            attempt: 0,
        }
    }

    /// Number of reconnect attempts since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Reset to the initial delay. Called whenever a connection reaches
    /// the open state.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Advance the attempt counter and return the delay to wait before
    /// the next connect attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);

        let base = self.base_delay(self.attempt);
        let jitter_ms = (base.as_millis() as f64 * self.jitter) as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };

        (base + Duration::from_millis(extra)).min(self.max)
    }

    /// Deterministic (un-jittered) delay for a given attempt number.
    fn base_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.initial.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        let shift = attempt.saturating_sub(1);
        let multiplier = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
        let delay_ms = base_ms.saturating_mul(multiplier).min(max_ms);

        Duration::from_millis(delay_ms)
    }
}
