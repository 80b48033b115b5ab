// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

#[test]
fn test_empty_config_uses_defaults() {
    let config = ChannelConfig::from_toml_str("").unwrap();
    assert_eq!(config, ChannelConfig::default());
    assert_eq!(config.backoff.initial_delay(), Duration::from_millis(100));
    assert_eq!(config.backoff.max_delay(), Duration::from_secs(30));
}

#[test]
fn test_partial_backoff_section() {
    let config = ChannelConfig::from_toml_str("[backoff]\ninitial_delay_ms = 250\n").unwrap();
    assert_eq!(config.backoff.initial_delay_ms, 250);
    assert_eq!(config.backoff.multiplier, 2.0);
    assert_eq!(config.backoff.jitter, 0.5);
}

#[test]
fn test_load_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("channel.toml");
    std::fs::write(
        &path,
        "[backoff]\ninitial_delay_ms = 50\nmax_delay_secs = 5\nmultiplier = 3.0\njitter = 0.0\n",
    )
    .unwrap();

    let config = ChannelConfig::load(&path).unwrap();
    assert_eq!(config.backoff.initial_delay_ms, 50);
    assert_eq!(config.backoff.max_delay_secs, 5);
    assert_eq!(config.backoff.multiplier, 3.0);
    assert_eq!(config.backoff.jitter, 0.0);
}

#[test]
fn test_load_missing_file() {
    let temp = TempDir::new().unwrap();
    let err = ChannelConfig::load(&temp.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_load_malformed_file() {
    let err = ChannelConfig::from_toml_str("[backoff\n").unwrap_err();
    assert!(matches!(err, Error::Toml(_)));
}

#[parameterized(
    zero_initial = { "[backoff]\ninitial_delay_ms = 0\n", "positive" },
    initial_over_max = { "[backoff]\ninitial_delay_ms = 5000\nmax_delay_secs = 1\n", "exceeds" },
    shrinking = { "[backoff]\nmultiplier = 0.5\n", "multiplier" },
    jitter_too_big = { "[backoff]\njitter = 1.5\n", "jitter" },
    jitter_negative = { "[backoff]\njitter = -0.1\n", "jitter" },
)]
fn test_invalid_backoff(content: &str, expected: &str) {
    let err = ChannelConfig::from_toml_str(content).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains(expected), "{err}");
}
