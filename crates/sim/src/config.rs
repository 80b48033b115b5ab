// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Simulation configuration.
//!
//! ```toml
//! [workload]
//! clients = 3
//! edits_per_client = 50
//! seed = 0
//!
//! [faults]
//! drop_before_apply = 0.05
//! drop_after_apply = 0.05
//! probe_failure = 0.1
//!
//! [channel.backoff]
//! initial_delay_ms = 100
//! ```
//!
//! Every section and field is optional.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use oc_core::{ChannelConfig, Error, Result};

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub faults: FaultConfig,
    /// Settings shared by every simulated client's channel.
    #[serde(default)]
    pub channel: ChannelConfig,
}

/// What the simulated editors do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Number of concurrent clients (default: 3).
    #[serde(default = "default_clients")]
    pub clients: usize,
    /// Edits each client makes (default: 50).
    #[serde(default = "default_edits_per_client")]
    pub edits_per_client: usize,
    /// Seed for every random choice in the run (default: 0).
    #[serde(default)]
    pub seed: u64,
    /// Mean pause between one client's edits, in milliseconds (default: 20).
    #[serde(default = "default_edit_interval_ms")]
    pub edit_interval_ms: u64,
    /// Chance that a client applies pending remote edits before editing (default: 0.5).
    #[serde(default = "default_drain_probability")]
    pub drain_probability: f64,
}

fn default_clients() -> usize {
    3
}

fn default_edits_per_client() -> usize {
    50
}

fn default_edit_interval_ms() -> u64 {
    20
}

fn default_drain_probability() -> f64 {
    0.5
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        WorkloadConfig {
            clients: default_clients(),
            edits_per_client: default_edits_per_client(),
            seed: 0,
            edit_interval_ms: default_edit_interval_ms(),
            drain_probability: default_drain_probability(),
        }
    }
}

/// Failures and delays injected by the simulated server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Chance a submit is lost before the server applies it (default: 0.05).
    #[serde(default = "default_drop_rate")]
    pub drop_before_apply: f64,
    /// Chance a submit is applied but its response is lost (default: 0.05).
    #[serde(default = "default_drop_rate")]
    pub drop_after_apply: f64,
    /// Chance a revision probe fails (default: 0.1).
    #[serde(default = "default_probe_failure")]
    pub probe_failure: f64,
    /// Lower bound on one-way latency, in milliseconds (default: 5).
    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,
    /// Upper bound on one-way latency, in milliseconds (default: 50).
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,
}

fn default_drop_rate() -> f64 {
    0.05
}

fn default_probe_failure() -> f64 {
    0.1
}

fn default_min_latency_ms() -> u64 {
    5
}

fn default_max_latency_ms() -> u64 {
    50
}

impl Default for FaultConfig {
    fn default() -> Self {
        FaultConfig {
            drop_before_apply: default_drop_rate(),
            drop_after_apply: default_drop_rate(),
            probe_failure: default_probe_failure(),
            min_latency_ms: default_min_latency_ms(),
            max_latency_ms: default_max_latency_ms(),
        }
    }
}

impl FaultConfig {
    /// No failures and a fixed latency.
    pub fn none() -> Self {
        FaultConfig {
            drop_before_apply: 0.0,
            drop_after_apply: 0.0,
            probe_failure: 0.0,
            ..Self::default()
        }
    }

    pub fn min_latency(&self) -> Duration {
        Duration::from_millis(self.min_latency_ms)
    }

    pub fn max_latency(&self) -> Duration {
        Duration::from_millis(self.max_latency_ms)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("drop_before_apply", self.drop_before_apply),
            ("drop_after_apply", self.drop_after_apply),
            ("probe_failure", self.probe_failure),
        ] {
            if !(0.0..1.0).contains(&p) {
                return Err(Error::Config(format!(
                    "faults.{name} must be within [0, 1), got {p}\n  hint: a rate of 1 never lets the channel recover"
                )));
            }
        }
        if self.drop_before_apply + self.drop_after_apply >= 1.0 {
            return Err(Error::Config(
                "faults.drop_before_apply + faults.drop_after_apply must be below 1".to_string(),
            ));
        }
        if self.min_latency_ms > self.max_latency_ms {
            return Err(Error::Config(format!(
                "faults.min_latency_ms ({}) exceeds faults.max_latency_ms ({})",
                self.min_latency_ms, self.max_latency_ms
            )));
        }
        Ok(())
    }
}

impl WorkloadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.clients == 0 {
            return Err(Error::Config(
                "workload.clients must be positive\n  hint: try 3".to_string(),
            ));
        }
        if u32::try_from(self.clients).is_err() {
            return Err(Error::Config(format!(
                "workload.clients ({}) is too large",
                self.clients
            )));
        }
        if !(0.0..=1.0).contains(&self.drain_probability) {
            return Err(Error::Config(format!(
                "workload.drain_probability must be within [0, 1], got {}",
                self.drain_probability
            )));
        }
        Ok(())
    }
}

impl SimConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.workload.validate()?;
        self.faults.validate()?;
        self.channel.validate()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
