// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Channel configuration.
//!
//! Configuration is plain TOML:
//!
//! ```toml
//! [backoff]
//! initial_delay_ms = 100
//! max_delay_secs = 30
//! multiplier = 2.0
//! jitter = 0.5
//! ```
//!
//! Every field is optional and falls back to the defaults above.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Top-level channel configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Resync retry delays.
    #[serde(default)]
    pub backoff: BackoffConfig,
}

/// Exponential backoff parameters for resync attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first resync attempt, in milliseconds (default: 100).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on any delay, in seconds (default: 30).
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Growth factor between attempts (default: 2.0).
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Random spread as a fraction of the delay, in `[0, 1]` (default: 0.5).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_secs() -> u64 {
    30
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.5
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl BackoffConfig {
    /// Delay before the first attempt.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Upper bound on any delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }

    /// Checks that the parameters describe a usable backoff.
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay_ms == 0 {
            return Err(Error::Config(
                "backoff.initial_delay_ms must be positive\n  hint: try 100".to_string(),
            ));
        }
        if self.initial_delay() > self.max_delay() {
            return Err(Error::Config(format!(
                "backoff.initial_delay_ms ({}) exceeds backoff.max_delay_secs ({})",
                self.initial_delay_ms, self.max_delay_secs
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::Config(format!(
                "backoff.multiplier must be at least 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::Config(format!(
                "backoff.jitter must be within [0, 1], got {}",
                self.jitter
            )));
        }
        Ok(())
    }
}

impl ChannelConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ChannelConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<()> {
        self.backoff.validate()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
