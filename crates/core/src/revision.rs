// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Revision numbers and session identifiers.
//!
//! A revision is a position in the server's total order of operations.
//! Revision `n` is the document state after the `n`-th operation was
//! applied, so an operation "applied at revision n" moves the document
//! from `n - 1` to `n`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A position in the server's total order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// The empty document, before any operation was applied.
    pub const ZERO: Revision = Revision(0);

    /// Creates a revision from its numeric value.
    pub const fn new(value: u64) -> Self {
        Revision(value)
    }

    /// Returns the numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the revision immediately after this one.
    pub const fn next(self) -> Self {
        Revision(self.0 + 1)
    }

    /// Returns the revision `count` operations after this one.
    pub const fn advance(self, count: u64) -> Self {
        Revision(self.0 + count)
    }

    /// Number of operations between `earlier` and this revision.
    ///
    /// Returns `None` if `earlier` is actually later.
    pub fn since(self, earlier: Revision) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Revision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(Revision)
            .map_err(|_| Error::InvalidRevision(s.to_string()))
    }
}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Revision(value)
    }
}

/// Identifies one connected instance of a channel.
///
/// The server tags every relayed operation with the session that
/// submitted it, which is how a channel recognises echoes of its own
/// operations. Always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session id, rejecting the empty string.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidSessionId(id));
        }
        Ok(SessionId(id))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SessionId::new(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        SessionId::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[path = "revision_tests.rs"]
mod tests;
