// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for oc-core operations.

use thiserror::Error;

use crate::queue::QueueError;

/// All errors surfaced by the channel and its building blocks.
#[derive(Debug, Error)]
pub enum Error {
    #[error("channel is not connected\n  hint: call connect() with a revision and session id first")]
    NotConnected,

    #[error("channel is already connected\n  hint: disconnect() before connecting again")]
    AlreadyConnected,

    #[error("invalid session id: '{0}'\n  hint: session ids must be non-empty")]
    InvalidSessionId(String),

    #[error("invalid revision: '{0}'\n  hint: revisions are non-negative integers")]
    InvalidRevision(String),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("server rejected request: {0}")]
    Server(String),

    #[error("receive channel failed: {0}")]
    ReceiveFailed(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for oc-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
