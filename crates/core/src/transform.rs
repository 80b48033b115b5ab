// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The operational-transform contract consumed by the transform queue.
//!
//! The queue does not know what an operation means. It only relies on a
//! [`Transformer`] that, given client and server operations concurrent
//! against the same base, produces versions of each that apply on top of
//! the other:
//!
//! ```text
//! base ──server──► S ──client'──► D
//! base ──client──► C ──server'──► D
//! ```

/// Rejection raised when two operation sequences cannot be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transform rejected: {0}")]
pub struct TransformError(pub String);

impl TransformError {
    /// Creates a rejection with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        TransformError(reason.into())
    }
}

/// Output of a transform: both sides rewritten to follow the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed<M> {
    /// Client operations rewritten to apply after the server operations.
    pub client_ops: Vec<M>,
    /// Server operations rewritten to apply after the client operations.
    pub server_ops: Vec<M>,
}

/// Reconciles concurrent operation sequences.
pub trait Transformer<M> {
    /// Transforms `client_ops` and `server_ops`, both based on the same
    /// document state.
    ///
    /// Applying `server_ops` then the returned client ops must converge
    /// with applying `client_ops` then the returned server ops. Returns an
    /// error if the inputs are structurally incompatible.
    fn transform(
        &self,
        client_ops: Vec<M>,
        server_ops: Vec<M>,
    ) -> Result<Transformed<M>, TransformError>;
}

impl<M, T: Transformer<M> + ?Sized> Transformer<M> for &T {
    fn transform(
        &self,
        client_ops: Vec<M>,
        server_ops: Vec<M>,
    ) -> Result<Transformed<M>, TransformError> {
        (**self).transform(client_ops, server_ops)
    }
}
