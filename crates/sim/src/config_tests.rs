// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

#[test]
fn test_empty_config_uses_defaults() {
    let config = SimConfig::from_toml_str("").unwrap();
    assert_eq!(config, SimConfig::default());
    assert_eq!(config.workload.clients, 3);
    assert_eq!(config.faults.max_latency(), Duration::from_millis(50));
    assert_eq!(config.channel.backoff.initial_delay_ms, 100);
}

#[test]
fn test_nested_channel_section() {
    let config = SimConfig::from_toml_str(
        "[workload]\nclients = 5\nseed = 42\n\n[channel.backoff]\ninitial_delay_ms = 10\n",
    )
    .unwrap();
    assert_eq!(config.workload.clients, 5);
    assert_eq!(config.workload.seed, 42);
    assert_eq!(config.workload.edits_per_client, 50);
    assert_eq!(config.channel.backoff.initial_delay_ms, 10);
}

#[test]
fn test_load_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sim.toml");
    std::fs::write(&path, "[faults]\ndrop_before_apply = 0.2\nmin_latency_ms = 1\n").unwrap();

    let config = SimConfig::load(&path).unwrap();
    assert_eq!(config.faults.drop_before_apply, 0.2);
    assert_eq!(config.faults.min_latency(), Duration::from_millis(1));
    assert_eq!(config.faults.probe_failure, 0.1);
}

#[test]
fn test_missing_file_is_io_error() {
    let temp = TempDir::new().unwrap();
    let err = SimConfig::load(&temp.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_none_disables_faults() {
    let faults = FaultConfig::none();
    assert_eq!(faults.drop_before_apply, 0.0);
    assert_eq!(faults.probe_failure, 0.0);
    faults.validate().unwrap();
}

#[parameterized(
    no_clients = { "[workload]\nclients = 0\n", "clients" },
    drain_above_one = { "[workload]\ndrain_probability = 1.5\n", "drain_probability" },
    certain_drop = { "[faults]\ndrop_before_apply = 1.0\n", "drop_before_apply" },
    drops_sum_to_one = { "[faults]\ndrop_before_apply = 0.5\ndrop_after_apply = 0.5\n", "below 1" },
    negative_probe = { "[faults]\nprobe_failure = -0.1\n", "probe_failure" },
    latency_inverted = { "[faults]\nmin_latency_ms = 90\nmax_latency_ms = 10\n", "exceeds" },
    bad_backoff = { "[channel.backoff]\njitter = 2.0\n", "jitter" },
)]
fn test_invalid_config(toml: &str, expected: &str) {
    let err = SimConfig::from_toml_str(toml).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "{err}");
    assert!(err.to_string().contains(expected), "{err}");
}

#[test]
fn test_malformed_toml() {
    let err = SimConfig::from_toml_str("[workload\n").unwrap_err();
    assert!(matches!(err, Error::Toml(_)));
}
