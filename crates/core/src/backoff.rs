// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Jittered exponential backoff for resync attempts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use crate::config::BackoffConfig;

/// A resettable sequence of retry delays.
pub trait Backoff {
    /// Returns the delay before the next attempt and advances the sequence.
    fn next_delay(&mut self) -> Duration;

    /// Restarts the sequence from the initial delay.
    fn reset(&mut self);
}

/// Exponentially growing delays with random spread.
///
/// Attempt `n` waits `initial * multiplier^n`, capped at the configured
/// maximum, then scaled by a random factor in `[1 - jitter, 1 + jitter]`
/// and capped again.
#[derive(Debug)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    attempt: u32,
    rng: StdRng,
}

/// Growth stops mattering long before this many attempts.
const MAX_EXPONENT: u32 = 63;

impl ExponentialBackoff {
    /// Creates a backoff seeded from the operating system.
    pub fn new(config: BackoffConfig) -> Self {
        ExponentialBackoff {
            config,
            attempt: 0,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Creates a backoff with a fixed seed, for reproducible runs.
    pub fn with_seed(config: BackoffConfig, seed: u64) -> Self {
        ExponentialBackoff {
            config,
            attempt: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    fn base_delay_ms(&self) -> f64 {
        let initial = self.config.initial_delay_ms as f64;
        let max = self.config.max_delay().as_millis() as f64;
        let exponent = self.attempt.min(MAX_EXPONENT) as i32;
        (initial * self.config.multiplier.powi(exponent)).min(max)
    }
}

impl Backoff for ExponentialBackoff {
    fn next_delay(&mut self) -> Duration {
        let base = self.base_delay_ms();
        let max = self.config.max_delay().as_millis() as f64;
        let jitter = self.config.jitter;

        let delay = if jitter > 0.0 {
            let factor = self.rng.random_range((1.0 - jitter)..=(1.0 + jitter));
            (base * factor).min(max)
        } else {
            base
        };

        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(delay.round() as u64)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
