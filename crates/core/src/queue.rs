// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transform queue: buffers for one connected session.
//!
//! Holds three ordered buffers and the confirmed revision:
//!
//! ```text
//!   send() ──► queued ──push──► unacked ──ack──► (confirmed)
//!
//!   server ──► transform against unacked + queued ──► pending ──► receive()
//! ```
//!
//! Local operations are always kept relative to the confirmed revision,
//! so an arriving remote operation is transformed exactly once against
//! whatever is buffered, never replayed against history. The queue does
//! no I/O and knows nothing about timers or the network.

use std::collections::VecDeque;
use std::fmt;
use std::mem;

use crate::revision::Revision;
use crate::transform::{TransformError, Transformer};

/// Error type for queue operations.
///
/// Every variant means the caller fed the queue something inconsistent
/// with the server's total order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// A revision skipped ahead or went backwards.
    #[error("expected revision {expected}, got {actual}")]
    RevisionGap { expected: Revision, actual: Revision },

    /// An acknowledgment arrived with no unacknowledged operation.
    #[error("acknowledgment at revision {revision} with no unacknowledged operations")]
    NothingToAck { revision: Revision },

    /// An echo of an eagerly acknowledged operation had the wrong revision.
    #[error("expected echo of eagerly acknowledged operation at revision {expected}, got {actual}")]
    UnexpectedEcho { expected: Revision, actual: Revision },

    /// An operation arrived while echoes of eagerly acknowledged operations
    /// were still expected.
    #[error("{count} eagerly acknowledged echoes still expected at revision {revision}")]
    EchoesOutstanding { count: u64, revision: Revision },

    /// The transformer rejected the operations.
    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Buffers and reconciles local and remote operations for one session.
pub struct TransformQueue<M, X> {
    transformer: X,
    /// All operations up to and including this revision are reflected here.
    revision: Revision,
    /// Accepted locally, not yet transmitted.
    queued: Vec<M>,
    /// Transmitted, not yet confirmed.
    unacked: VecDeque<M>,
    /// Transformed remote operations waiting to be received.
    server_ops: VecDeque<M>,
    /// Echoes still to arrive for operations acknowledged eagerly.
    expected_acks: u64,
}

impl<M, X: Transformer<M>> TransformQueue<M, X> {
    /// Creates an empty queue at revision zero.
    pub fn new(transformer: X) -> Self {
        TransformQueue {
            transformer,
            revision: Revision::ZERO,
            queued: Vec::new(),
            unacked: VecDeque::new(),
            server_ops: VecDeque::new(),
            expected_acks: 0,
        }
    }

    /// Starts a session at `revision` with empty buffers.
    pub fn init(&mut self, revision: Revision) {
        self.reset();
        self.revision = revision;
    }

    /// Drops all buffered state.
    pub fn reset(&mut self) {
        self.revision = Revision::ZERO;
        self.queued.clear();
        self.unacked.clear();
        self.server_ops.clear();
        self.expected_acks = 0;
    }

    /// The confirmed revision.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Stages a locally applied operation.
    ///
    /// `op` was produced against the local document, which does not yet
    /// include any pending remote operation. Those are transformed past
    /// `op` so that both buffers describe the same local state.
    pub fn client_op(&mut self, op: M) -> QueueResult<()> {
        if self.server_ops.is_empty() {
            self.queued.push(op);
            return Ok(());
        }

        let pending: Vec<M> = self.server_ops.drain(..).collect();
        let transformed = self.transformer.transform(vec![op], pending)?;
        self.queued.extend(transformed.client_ops);
        self.server_ops.extend(transformed.server_ops);
        Ok(())
    }

    /// Returns true if operations are waiting to be transmitted.
    pub fn has_queued_client_ops(&self) -> bool {
        !self.queued.is_empty()
    }

    /// Returns true if a transmitted batch awaits confirmation.
    pub fn has_unacknowledged_client_ops(&self) -> bool {
        !self.unacked.is_empty()
    }

    /// Returns true if a transformed remote operation can be received.
    pub fn has_server_op(&self) -> bool {
        !self.server_ops.is_empty()
    }

    /// Moves every queued operation into the unacknowledged batch.
    ///
    /// The caller only does this when no batch is in flight.
    pub fn push_queued_ops_to_unacked(&mut self) {
        debug_assert!(
            self.unacked.is_empty(),
            "pushing queued operations over an unacknowledged batch"
        );
        let queued = mem::take(&mut self.queued);
        self.unacked.extend(queued);
    }

    /// The unacknowledged batch, in submission order.
    pub fn unacked_client_ops(&mut self) -> &[M] {
        self.unacked.make_contiguous()
    }

    /// Accepts an operation another session applied at `revision`.
    ///
    /// The remote operation is serialized before every buffered local
    /// operation: it is transformed against the unacknowledged batch and
    /// then the queued operations, and those are replaced by their own
    /// transformed versions.
    pub fn server_op(&mut self, revision: Revision, op: M) -> QueueResult<()> {
        if self.expected_acks > 0 {
            return Err(QueueError::EchoesOutstanding {
                count: self.expected_acks,
                revision: self.revision,
            });
        }
        self.check_next(revision)?;

        let mut server = vec![op];
        if !self.unacked.is_empty() {
            let transformed = self
                .transformer
                .transform(Vec::from(mem::take(&mut self.unacked)), server)?;
            self.unacked = transformed.client_ops.into();
            server = transformed.server_ops;
        }
        if !self.queued.is_empty() {
            let transformed = self
                .transformer
                .transform(mem::take(&mut self.queued), server)?;
            self.queued = transformed.client_ops;
            server = transformed.server_ops;
        }

        self.server_ops.extend(server);
        self.revision = revision;
        Ok(())
    }

    /// Returns true if the echo at `revision` belongs to an operation that
    /// was already acknowledged eagerly, and consumes that expectation.
    pub fn expected_ack(&mut self, revision: Revision) -> QueueResult<bool> {
        if self.expected_acks == 0 {
            return Ok(false);
        }
        let expected = Revision::new(self.revision.get() + 1 - self.expected_acks);
        if revision != expected {
            return Err(QueueError::UnexpectedEcho {
                expected,
                actual: revision,
            });
        }
        self.expected_acks -= 1;
        Ok(true)
    }

    /// Confirms the oldest unacknowledged operation at `revision`.
    ///
    /// Returns true if the unacknowledged batch is now empty.
    pub fn ack_client_op(&mut self, revision: Revision) -> QueueResult<bool> {
        if self.expected_acks > 0 {
            return Err(QueueError::EchoesOutstanding {
                count: self.expected_acks,
                revision: self.revision,
            });
        }
        self.check_next(revision)?;
        if self.unacked.is_empty() {
            return Err(QueueError::NothingToAck { revision });
        }

        self.unacked.pop_front();
        self.revision = revision;
        Ok(self.unacked.is_empty())
    }

    /// Confirms the whole unacknowledged batch if the server applied it
    /// back to back at `applied`.
    ///
    /// That is the case exactly when the batch length equals
    /// `applied - revision`: no other session's operation landed between
    /// the confirmed revision and the batch. The echoes of these
    /// operations are then expected and ignored by [`Self::expected_ack`].
    pub fn ack_ops_if_version_matches(&mut self, applied: Revision) -> Option<Vec<M>> {
        if self.unacked.is_empty() {
            return None;
        }
        let count = self.unacked.len() as u64;
        if applied.since(self.revision) != Some(count) {
            return None;
        }

        self.expected_acks += count;
        self.revision = applied;
        Some(mem::take(&mut self.unacked).into())
    }

    /// The next transformed remote operation, if any.
    pub fn peek_server_op(&self) -> Option<&M> {
        self.server_ops.front()
    }

    /// Removes and returns the next transformed remote operation.
    pub fn remove_server_op(&mut self) -> Option<M> {
        self.server_ops.pop_front()
    }

    /// Number of queued operations.
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// Number of unacknowledged operations.
    pub fn unacked_len(&self) -> usize {
        self.unacked.len()
    }

    /// Number of pending remote operations.
    pub fn server_ops_len(&self) -> usize {
        self.server_ops.len()
    }

    fn check_next(&self, revision: Revision) -> QueueResult<()> {
        let expected = self.revision.next();
        if revision != expected {
            return Err(QueueError::RevisionGap {
                expected,
                actual: revision,
            });
        }
        Ok(())
    }
}

impl<M, X> fmt::Debug for TransformQueue<M, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformQueue")
            .field("revision", &self.revision)
            .field("queued", &self.queued.len())
            .field("unacked", &self.unacked.len())
            .field("server_ops", &self.server_ops.len())
            .field("expected_acks", &self.expected_acks)
            .finish()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
