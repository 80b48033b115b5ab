// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Messages exchanged with the send service and the receive channel.
//!
//! The channel never sees the wire format. Transport adapters translate
//! whatever they speak into these values:
//! - a [`Delivery`] for every operation the server applied, in revision order
//! - a [`ServiceError`] classified as retryable or fatal

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::revision::{Revision, SessionId};

/// Identifies one request, scheduled task, or receive connection.
///
/// Tokens are minted by the channel and handed to collaborators. A
/// completion carrying a token that is no longer live is dropped, which
/// is how late responses to abandoned requests are neutralised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(u64);

impl Token {
    /// Creates a token from its raw value.
    pub const fn new(raw: u64) -> Self {
        Token(raw)
    }

    /// Returns the raw value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic token source.
#[derive(Debug, Default)]
pub struct TokenSource {
    next: u64,
}

impl TokenSource {
    /// Creates a source starting at token #1.
    pub fn new() -> Self {
        TokenSource { next: 1 }
    }

    /// Returns a token never returned before by this source.
    pub fn mint(&mut self) -> Token {
        let token = Token(self.next.max(1));
        self.next = token.0 + 1;
        token
    }
}

/// An operation the server applied, as relayed by the receive channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery<M> {
    /// Revision the document reached by applying `op`.
    pub revision: Revision,
    /// Session that submitted `op`.
    pub session: SessionId,
    /// The operation, exactly as it appears in server history.
    pub op: M,
}

impl<M> Delivery<M> {
    /// Creates a delivery.
    pub fn new(revision: Revision, session: SessionId, op: M) -> Self {
        Delivery {
            revision,
            session,
            op,
        }
    }
}

impl<M: Serialize> Delivery<M> {
    /// Serializes the delivery to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl<M: for<'de> Deserialize<'de>> Delivery<M> {
    /// Deserializes a delivery from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Failure reported by the send service or the receive channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ServiceError {
    /// Connection-level failure (timeout, dropped connection, overload).
    ///
    /// The request may or may not have taken effect on the server.
    #[error("retryable failure: {0}")]
    Retryable(String),

    /// The server rejected the request as invalid. Retrying cannot help.
    #[error("fatal failure: {0}")]
    Fatal(String),
}

impl ServiceError {
    /// Creates a retryable error.
    pub fn retryable(message: impl Into<String>) -> Self {
        ServiceError::Retryable(message.into())
    }

    /// Creates a fatal error.
    pub fn fatal(message: impl Into<String>) -> Self {
        ServiceError::Fatal(message.into())
    }

    /// Returns true if the failure should drive a resync instead of a disconnect.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Retryable(_))
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        match self {
            ServiceError::Retryable(m) | ServiceError::Fatal(m) => m,
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
