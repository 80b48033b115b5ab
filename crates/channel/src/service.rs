// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborators the channel talks to.
//!
//! Requests go out through these traits synchronously; their outcomes
//! come back later as [`Event`](crate::scheduler::Event)s fed to
//! [`OperationChannel::handle`](crate::OperationChannel::handle), tagged
//! with the token the channel passed in.

use oc_core::{Error, Revision, Token};

/// Submits operations to the server.
pub trait SendService<M> {
    /// Submits `ops`, authored against `base`, as one batch.
    ///
    /// Completes with `Event::SubmitResponse` carrying the revision at
    /// which the last operation was applied, or a failure.
    fn submit_operations(&mut self, token: Token, base: Revision, ops: Vec<M>);

    /// Asks for the server's current revision without touching the document.
    ///
    /// Completes with `Event::ProbeResponse`.
    fn request_revision(&mut self, token: Token);

    /// Hint that the outcome of request `token` will be ignored.
    fn callback_not_needed(&mut self, token: Token);
}

/// Stream of operations applied by the server.
pub trait ReceiveChannel {
    /// Starts delivering every operation applied after `revision`.
    ///
    /// Deliveries arrive as `Event::Incoming` tagged with `connection`, in
    /// revision order and without gaps.
    fn open(&mut self, connection: Token, revision: Revision);

    /// Stops delivering.
    fn close(&mut self);
}

/// Receives notifications from the channel.
pub trait Listener<M> {
    /// Another session's operation was applied, exactly as it appears in
    /// server history.
    ///
    /// Do not apply `op` locally: drain transformed operations with
    /// [`OperationChannel::receive`](crate::OperationChannel::receive).
    fn on_remote_op(&mut self, op: &M);

    /// One of this channel's operations was confirmed. `clean` is true if
    /// nothing else is queued or in flight.
    fn on_ack(&mut self, op: &M, clean: bool);

    /// The channel hit a fatal error while handling an event and
    /// disconnected.
    ///
    /// Errors from [`OperationChannel::send`](crate::OperationChannel::send)
    /// also disconnect, but are returned to its caller and not reported here.
    fn on_error(&mut self, error: &Error);
}
