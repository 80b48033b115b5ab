// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! oc-sim: run a simulated editing session and check it converges.
//!
//! Exits with status 1 if any client diverged from the server.

use clap::Parser;
use std::path::PathBuf;

use oc_sim::{SimConfig, Simulation};

/// Simulate concurrent editors over unreliable operation channels
#[derive(Parser, Debug)]
#[command(name = "oc-sim")]
#[command(about = "Simulate concurrent editors over unreliable operation channels")]
struct Args {
    /// Number of concurrent clients
    #[arg(short, long)]
    clients: Option<usize>,

    /// Edits made by each client
    #[arg(short, long)]
    edits: Option<usize>,

    /// Seed for every random choice
    #[arg(short, long)]
    seed: Option<u64>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(clients) = args.clients {
        config.workload.clients = clients;
    }
    if let Some(edits) = args.edits {
        config.workload.edits_per_client = edits;
    }
    if let Some(seed) = args.seed {
        config.workload.seed = seed;
    }

    let report = Simulation::new(config)?.run();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
