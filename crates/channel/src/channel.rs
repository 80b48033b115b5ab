// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The operation channel state machine.
//!
//! Drives a [`TransformQueue`] through one connected session: batches local
//! operations into submits, confirms them from submit responses or their
//! echoes on the receive channel, and recovers from retryable failures by
//! probing the server's revision after a backoff delay.

use std::fmt;

use serde::Serialize;

use oc_core::protocol::TokenSource;
use oc_core::{
    Backoff, Delivery, Error, Result, Revision, ServiceError, SessionId, Token, TransformQueue,
    Transformer,
};

use crate::scheduler::{Event, Scheduler, Task, TaskKind};
use crate::service::{Listener, ReceiveChannel, SendService};
use crate::state::ChannelState;

/// Everything the channel talks to besides its transformer.
pub struct Collaborators<M> {
    pub send: Box<dyn SendService<M>>,
    pub receive: Box<dyn ReceiveChannel>,
    pub scheduler: Box<dyn Scheduler>,
    pub backoff: Box<dyn Backoff>,
    pub listener: Box<dyn Listener<M>>,
}

/// Counters for one channel, across sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    /// Batches submitted for the first time.
    pub submits: u64,
    /// Batches submitted again after a resync.
    pub resends: u64,
    /// Revision probes sent.
    pub probes: u64,
    /// Submits and probes that failed retryably.
    pub retryable_failures: u64,
    /// Operations confirmed by a submit response.
    pub eager_acks: u64,
    /// Operations confirmed by their echo.
    pub direct_acks: u64,
    /// Echoes ignored because the operation was already confirmed.
    pub duplicate_acks: u64,
    /// Operations from other sessions.
    pub remote_ops: u64,
}

/// Live session data.
struct Session {
    id: SessionId,
    connection: Token,
}

/// State plus the data that state is allowed to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialised,
    AllAcked {
        send_task: Option<Token>,
    },
    WaitingAck {
        submit: Token,
        /// Confirmed revision the batch was submitted at.
        base: Revision,
        /// Number of operations submitted.
        batch: u64,
        /// The submit response arrived but did not confirm the batch.
        answered: bool,
    },
    DelayResync {
        timer: Token,
    },
    WaitingSync {
        probe: Token,
        /// The probe response arrived.
        answered: bool,
        /// Revision the probe reported.
        probe_revision: Option<Revision>,
    },
}

impl Phase {
    fn state(&self) -> ChannelState {
        match self {
            Phase::Uninitialised => ChannelState::Uninitialised,
            Phase::AllAcked { .. } => ChannelState::AllAcked,
            Phase::WaitingAck { .. } => ChannelState::WaitingAck,
            Phase::DelayResync { .. } => ChannelState::DelayResync,
            Phase::WaitingSync { .. } => ChannelState::WaitingSync,
        }
    }
}

/// Client end of an optimistic concurrency-control session.
///
/// Local operations go in through [`send`](Self::send) after the caller
/// applied them to its document; transformed remote operations come out
/// of [`receive`](Self::receive). Everything asynchronous arrives through
/// [`handle`](Self::handle).
pub struct OperationChannel<M, X> {
    queue: TransformQueue<M, X>,
    session: Option<Session>,
    phase: Phase,
    tokens: TokenSource,
    send: Box<dyn SendService<M>>,
    receive: Box<dyn ReceiveChannel>,
    scheduler: Box<dyn Scheduler>,
    backoff: Box<dyn Backoff>,
    listener: Box<dyn Listener<M>>,
    stats: ChannelStats,
}

impl<M: Clone, X: Transformer<M>> OperationChannel<M, X> {
    /// Creates a disconnected channel.
    pub fn new(transformer: X, collaborators: Collaborators<M>) -> Self {
        let Collaborators {
            send,
            receive,
            scheduler,
            backoff,
            listener,
        } = collaborators;
        OperationChannel {
            queue: TransformQueue::new(transformer),
            session: None,
            phase: Phase::Uninitialised,
            tokens: TokenSource::new(),
            send,
            receive,
            scheduler,
            backoff,
            listener,
            stats: ChannelStats::default(),
        }
    }

    /// Starts a session whose document is at `revision`.
    pub fn connect(&mut self, revision: Revision, session: SessionId) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::AlreadyConnected);
        }

        let connection = self.tokens.mint();
        tracing::info!(session = %session, %revision, "connecting");
        self.queue.init(revision);
        self.backoff.reset();
        self.session = Some(Session {
            id: session,
            connection,
        });
        self.receive.open(connection, revision);
        self.set_phase(Phase::AllAcked { send_task: None });
        Ok(())
    }

    /// Ends the session, dropping everything not yet confirmed.
    pub fn disconnect(&mut self) -> Result<()> {
        if self.session.is_none() {
            return Err(Error::NotConnected);
        }
        tracing::info!(revision = %self.queue.revision(), "disconnecting");
        self.shutdown();
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Returns true if nothing is queued or awaiting confirmation.
    pub fn is_clean(&self) -> bool {
        !self.queue.has_queued_client_ops() && !self.queue.has_unacknowledged_client_ops()
    }

    /// The confirmed revision.
    pub fn revision(&self) -> Result<Revision> {
        self.require_connected()?;
        Ok(self.queue.revision())
    }

    /// Stages an operation the caller already applied locally.
    ///
    /// Transmission is deferred, so several calls in a row end up in one
    /// batch. If the operation cannot be reconciled with pending remote
    /// operations the channel disconnects and returns the error.
    pub fn send(&mut self, op: M) -> Result<()> {
        self.require_connected()?;
        if let Err(e) = self.queue.client_op(op) {
            tracing::error!(error = %e, "rejected local operation");
            self.shutdown();
            return Err(e.into());
        }
        self.schedule_send();
        Ok(())
    }

    /// The next transformed remote operation, without removing it.
    pub fn peek(&self) -> Result<Option<&M>> {
        self.require_connected()?;
        Ok(self.queue.peek_server_op())
    }

    /// Removes the next transformed remote operation, ready to apply locally.
    pub fn receive(&mut self) -> Result<Option<M>> {
        self.require_connected()?;
        Ok(self.queue.remove_server_op())
    }

    pub fn state(&self) -> ChannelState {
        self.phase.state()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref().map(|s| &s.id)
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// Checks the invariants of the current state.
    ///
    /// Returns a description of the first one violated.
    pub fn check_invariants(&self) -> std::result::Result<(), &'static str> {
        let unacked = self.queue.has_unacknowledged_client_ops();
        match self.phase {
            Phase::Uninitialised => {
                if self.session.is_some() {
                    return Err("uninitialised channel holds a session");
                }
                if !self.is_clean() || self.queue.has_server_op() {
                    return Err("uninitialised channel holds operations");
                }
            }
            Phase::AllAcked { send_task } => {
                if self.session.is_none() {
                    return Err("all_acked without a session");
                }
                if unacked {
                    return Err("all_acked with unacknowledged operations");
                }
                if send_task.is_some() && !self.queue.has_queued_client_ops() {
                    return Err("send scheduled with nothing queued");
                }
            }
            Phase::WaitingAck { .. } | Phase::DelayResync { .. } | Phase::WaitingSync { .. } => {
                if self.session.is_none() {
                    return Err("in flight without a session");
                }
                if !unacked {
                    return Err("in flight with nothing unacknowledged");
                }
            }
        }
        Ok(())
    }

    /// Applies one task, response, or delivery.
    pub fn handle(&mut self, event: Event<M>) {
        match event {
            Event::Task(task) => match task.kind {
                TaskKind::MaybeSend => self.maybe_send(task.id),
                TaskKind::Resync => self.start_probe(task.id),
            },
            Event::SubmitResponse { token, result } => self.on_submit_response(token, result),
            Event::ProbeResponse { token, result } => self.on_probe_response(token, result),
            Event::Incoming {
                connection,
                message,
            } => self.on_incoming(connection, message),
        }
    }

    fn require_connected(&self) -> Result<()> {
        if self.session.is_none() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    fn schedule_send(&mut self) {
        let Phase::AllAcked { send_task: None } = self.phase else {
            return;
        };
        if !self.queue.has_queued_client_ops() || self.queue.has_unacknowledged_client_ops() {
            return;
        }
        let id = self.tokens.mint();
        self.scheduler.schedule(Task {
            id,
            kind: TaskKind::MaybeSend,
        });
        self.phase = Phase::AllAcked { send_task: Some(id) };
    }

    fn maybe_send(&mut self, id: Token) {
        match self.phase {
            Phase::AllAcked {
                send_task: Some(live),
            } if live == id => {}
            _ => {
                tracing::debug!(token = %id, "dropping stale send task");
                return;
            }
        }
        self.phase = Phase::AllAcked { send_task: None };
        if self.queue.has_unacknowledged_client_ops() || !self.queue.has_queued_client_ops() {
            return;
        }

        self.queue.push_queued_ops_to_unacked();
        self.stats.submits += 1;
        self.transmit_unacked();
    }

    /// Submits the unacknowledged batch at the confirmed revision.
    fn transmit_unacked(&mut self) {
        let submit = self.tokens.mint();
        let base = self.queue.revision();
        let ops = self.queue.unacked_client_ops().to_vec();
        let batch = ops.len() as u64;
        tracing::debug!(token = %submit, %base, ops = batch, "submitting");
        self.send.submit_operations(submit, base, ops);
        self.set_phase(Phase::WaitingAck {
            submit,
            base,
            batch,
            answered: false,
        });
    }

    fn on_submit_response(&mut self, token: Token, result: std::result::Result<Revision, ServiceError>) {
        let (base, batch) = match self.phase {
            Phase::WaitingAck {
                submit,
                base,
                batch,
                answered: false,
            } if submit == token => (base, batch),
            _ => {
                tracing::debug!(%token, "dropping stale submit response");
                return;
            }
        };

        self.phase = Phase::WaitingAck {
            submit: token,
            base,
            batch,
            answered: true,
        };
        match result {
            Ok(applied) => self.maybe_eagerly_handle_ack(applied, base, batch),
            Err(e) if e.is_retryable() => {
                self.stats.retryable_failures += 1;
                tracing::warn!(%token, error = %e, "submit failed, resyncing");
                self.schedule_resync();
            }
            Err(e) => self.fail(Error::Server(e.message().to_string())),
        }
    }

    /// Confirms the batch from the submit response alone, provided the
    /// server applied it right at its base: `applied - base == batch`.
    /// Any other session's operation landing first means the echoes decide.
    fn maybe_eagerly_handle_ack(&mut self, applied: Revision, base: Revision, batch: u64) {
        if applied.since(base) != Some(batch) {
            tracing::debug!(%applied, %base, batch, "concurrent operations, awaiting echoes");
            return;
        }
        let Some(ops) = self.queue.ack_ops_if_version_matches(applied) else {
            tracing::debug!(%applied, revision = %self.queue.revision(), "awaiting echoes");
            return;
        };

        self.stats.eager_acks += ops.len() as u64;
        self.all_acknowledged();
        let count = ops.len();
        for (i, op) in ops.iter().enumerate() {
            let clean = i + 1 == count && self.is_clean();
            self.listener.on_ack(op, clean);
        }
    }

    fn schedule_resync(&mut self) {
        let delay = self.backoff.next_delay();
        let timer = self.tokens.mint();
        tracing::debug!(token = %timer, ?delay, "resync scheduled");
        self.scheduler.schedule_after(
            delay,
            Task {
                id: timer,
                kind: TaskKind::Resync,
            },
        );
        self.set_phase(Phase::DelayResync { timer });
    }

    fn start_probe(&mut self, id: Token) {
        match self.phase {
            Phase::DelayResync { timer } if timer == id => {}
            _ => {
                tracing::debug!(token = %id, "dropping stale resync task");
                return;
            }
        }

        let probe = self.tokens.mint();
        self.stats.probes += 1;
        self.send.request_revision(probe);
        self.set_phase(Phase::WaitingSync {
            probe,
            answered: false,
            probe_revision: None,
        });
    }

    fn on_probe_response(&mut self, token: Token, result: std::result::Result<Revision, ServiceError>) {
        match self.phase {
            Phase::WaitingSync {
                probe,
                answered: false,
                ..
            } if probe == token => {}
            _ => {
                tracing::debug!(%token, "dropping stale probe response");
                return;
            }
        }

        self.phase = Phase::WaitingSync {
            probe: token,
            answered: true,
            probe_revision: result.as_ref().ok().copied(),
        };
        match result {
            Ok(_) => self.maybe_synced(),
            Err(e) if e.is_retryable() => {
                self.stats.retryable_failures += 1;
                tracing::warn!(%token, error = %e, "probe failed");
                self.schedule_resync();
            }
            Err(e) => self.fail(Error::Server(e.message().to_string())),
        }
    }

    /// Finishes a resync once every operation up to the probed revision
    /// has been received.
    fn maybe_synced(&mut self) {
        let Phase::WaitingSync {
            probe_revision: Some(target),
            ..
        } = self.phase
        else {
            return;
        };
        if self.queue.revision() < target {
            return;
        }

        if !self.queue.has_unacknowledged_client_ops() {
            tracing::info!(revision = %target, "resync complete");
            self.all_acknowledged();
            return;
        }

        tracing::warn!(
            revision = %self.queue.revision(),
            ops = self.queue.unacked_len(),
            "batch was not applied, resending"
        );
        self.backoff.reset();
        self.stats.resends += 1;
        self.transmit_unacked();
    }

    fn all_acknowledged(&mut self) {
        self.discard_callbacks();
        self.backoff.reset();
        self.set_phase(Phase::AllAcked { send_task: None });
        self.schedule_send();
    }

    fn on_incoming(
        &mut self,
        connection: Token,
        message: std::result::Result<Delivery<M>, ServiceError>,
    ) {
        let own = match &self.session {
            Some(session) if session.connection == connection => session.id.clone(),
            _ => {
                tracing::debug!(%connection, "dropping delivery from stale connection");
                return;
            }
        };

        let delivery = match message {
            Ok(delivery) => delivery,
            Err(e) => {
                self.fail(Error::ReceiveFailed(e.to_string()));
                return;
            }
        };
        let result = if delivery.session == own {
            self.on_ack_own_operation(delivery)
        } else {
            self.on_incoming_operation(delivery)
        };
        if let Err(e) = result {
            self.fail(e);
            return;
        }
        self.maybe_synced();
    }

    fn on_ack_own_operation(&mut self, delivery: Delivery<M>) -> Result<()> {
        let Delivery { revision, op, .. } = delivery;
        if self.queue.expected_ack(revision)? {
            self.stats.duplicate_acks += 1;
            tracing::debug!(%revision, "echo of eagerly acknowledged operation");
            return Ok(());
        }

        let emptied = self.queue.ack_client_op(revision)?;
        self.stats.direct_acks += 1;
        if emptied {
            self.all_acknowledged();
        }
        let clean = self.is_clean();
        self.listener.on_ack(&op, clean);
        Ok(())
    }

    fn on_incoming_operation(&mut self, delivery: Delivery<M>) -> Result<()> {
        let Delivery { revision, op, .. } = delivery;
        self.queue.server_op(revision, op.clone())?;
        self.stats.remote_ops += 1;
        self.listener.on_remote_op(&op);
        Ok(())
    }

    /// Cancels the live task and hints that unanswered requests are moot.
    fn discard_callbacks(&mut self) {
        match self.phase {
            Phase::Uninitialised => {}
            Phase::AllAcked { send_task } => {
                if let Some(id) = send_task {
                    self.scheduler.cancel(id);
                }
            }
            Phase::WaitingAck {
                submit, answered, ..
            } => {
                if !answered {
                    self.send.callback_not_needed(submit);
                }
            }
            Phase::DelayResync { timer } => self.scheduler.cancel(timer),
            Phase::WaitingSync {
                probe, answered, ..
            } => {
                if !answered {
                    self.send.callback_not_needed(probe);
                }
            }
        }
    }

    fn shutdown(&mut self) {
        self.discard_callbacks();
        self.receive.close();
        self.session = None;
        self.queue.reset();
        self.set_phase(Phase::Uninitialised);
    }

    fn fail(&mut self, error: Error) {
        tracing::error!(error = %error, state = %self.state(), "channel failed");
        self.shutdown();
        self.listener.on_error(&error);
    }

    fn set_phase(&mut self, next: Phase) {
        let from = self.phase.state();
        let to = next.state();
        debug_assert!(
            ChannelState::is_valid_transition(from, to),
            "invalid transition {from} -> {to}"
        );
        tracing::debug!(%from, %to, "transition");
        self.phase = next;
        self.assert_invariants();
    }

    fn assert_invariants(&self) {
        let checked = self.check_invariants();
        if let Err(violation) = checked {
            tracing::error!(state = %self.state(), violation, "invariant violated");
        }
        debug_assert!(checked.is_ok(), "{} in {}", checked.err().unwrap_or_default(), self.state());
    }
}

impl<M, X: Transformer<M>> fmt::Display for OperationChannel<M, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.session.as_ref().map_or("-", |s| s.id.as_str());
        write!(
            f,
            "[{}] {} rev={} queued={} unacked={} pending={}",
            session,
            self.phase.state(),
            self.queue.revision(),
            self.queue.queued_len(),
            self.queue.unacked_len(),
            self.queue.server_ops_len()
        )
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
