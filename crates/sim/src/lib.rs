// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! oc-sim: deterministic end-to-end simulation of operation channels.
//!
//! Several simulated editors make random character edits against one
//! in-memory server that injects failures and latency. A run succeeds
//! when every editor ends up with the server's document and every edit
//! was acknowledged exactly once, in order.

pub mod config;
pub mod doc;
pub mod run;
pub mod server;

pub use config::{FaultConfig, SimConfig, WorkloadConfig};
pub use doc::{CharTransformer, Edit, SimOp, TextDoc};
pub use run::{ClientReport, Report, Simulation};
pub use server::{ServerStats, SimReceiveChannel, SimSendService, SimServer};
