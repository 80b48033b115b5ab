// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::config::{FaultConfig, WorkloadConfig};

fn config(clients: usize, edits: usize, seed: u64, faults: FaultConfig) -> SimConfig {
    SimConfig {
        workload: WorkloadConfig {
            clients,
            edits_per_client: edits,
            seed,
            ..WorkloadConfig::default()
        },
        faults,
        ..SimConfig::default()
    }
}

#[test]
fn single_client_without_faults() {
    let report = Simulation::new(config(1, 20, 3, FaultConfig::none()))
        .unwrap()
        .run();

    assert!(report.is_success(), "{report}");
    assert_eq!(report.revision, Revision::new(20));
    let client = &report.clients[0];
    assert_eq!(client.acked, 20);
    assert_eq!(client.remote_ops, 0);
    assert_eq!(client.stats.resends, 0);
    assert_eq!(client.document, report.document);
}

#[test]
fn clients_converge_without_faults() {
    let report = Simulation::new(config(4, 30, 11, FaultConfig::none()))
        .unwrap()
        .run();

    assert!(report.is_success(), "{report}");
    assert_eq!(report.revision, Revision::new(120));
    for client in &report.clients {
        assert_eq!(client.remote_ops, 90);
        assert_eq!(client.state, ChannelState::AllAcked);
    }
    assert_eq!(report.server.applied_ops, 120);
}

#[test]
fn clients_converge_with_faults() {
    let faults = FaultConfig {
        drop_before_apply: 0.2,
        drop_after_apply: 0.2,
        probe_failure: 0.3,
        ..FaultConfig::default()
    };
    let report = Simulation::new(config(3, 40, 5, faults)).unwrap().run();

    assert!(report.is_success(), "{report}");
    assert_eq!(report.revision, Revision::new(120));
    assert!(report.server.dropped_before_apply > 0);
    assert!(report.server.dropped_after_apply > 0);
    let resends: u64 = report.clients.iter().map(|c| c.stats.resends).sum();
    assert!(resends > 0);
}

#[test]
fn same_seed_same_run() {
    let a = Simulation::new(config(3, 15, 9, FaultConfig::default()))
        .unwrap()
        .run();
    let b = Simulation::new(config(3, 15, 9, FaultConfig::default()))
        .unwrap()
        .run();
    assert_eq!(a.document, b.document);
    assert_eq!(a.events, b.events);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn invalid_config_is_rejected() {
    let result = Simulation::new(config(0, 10, 0, FaultConfig::none()));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn no_edits_is_trivially_converged() {
    let report = Simulation::new(config(2, 0, 0, FaultConfig::none()))
        .unwrap()
        .run();
    assert!(report.is_success());
    assert_eq!(report.revision, Revision::ZERO);
    assert_eq!(report.events, 0);
}

#[test]
fn display_ends_with_verdict() {
    let report = Simulation::new(config(2, 5, 1, FaultConfig::none()))
        .unwrap()
        .run();
    let text = report.to_string();
    assert!(text.starts_with("seed 1:"), "{text}");
    assert!(text.contains("client-1 [all_acked] acked 5/5"), "{text}");
    assert!(text.lines().last().unwrap().starts_with("converged"));
}
