// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for oc-channel tests.

#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use oc_core::{
    Backoff, Delivery, Error, Revision, ServiceError, SessionId, Token, TransformError,
    Transformed, Transformer,
};

use crate::channel::{Collaborators, OperationChannel};
use crate::scheduler::{Event, ManualScheduler};
use crate::service::{Listener, ReceiveChannel, SendService};

/// Fixed delay handed out by [`FixedBackoff`].
pub const BACKOFF: Duration = Duration::from_millis(100);

/// Everything the mocks observed.
#[derive(Debug, Default)]
pub struct Log {
    pub submits: Vec<(Token, Revision, Vec<String>)>,
    pub probes: Vec<Token>,
    pub not_needed: Vec<Token>,
    pub opened: Vec<(Token, Revision)>,
    pub closed: usize,
    pub remote: Vec<String>,
    pub acks: Vec<(String, bool)>,
    pub errors: Vec<String>,
    pub delays: usize,
    pub resets: usize,
}

pub type SharedLog = Rc<RefCell<Log>>;

struct MockSend(SharedLog);

impl SendService<String> for MockSend {
    fn submit_operations(&mut self, token: Token, base: Revision, ops: Vec<String>) {
        self.0.borrow_mut().submits.push((token, base, ops));
    }

    fn request_revision(&mut self, token: Token) {
        self.0.borrow_mut().probes.push(token);
    }

    fn callback_not_needed(&mut self, token: Token) {
        self.0.borrow_mut().not_needed.push(token);
    }
}

struct MockReceive(SharedLog);

impl ReceiveChannel for MockReceive {
    fn open(&mut self, connection: Token, revision: Revision) {
        self.0.borrow_mut().opened.push((connection, revision));
    }

    fn close(&mut self) {
        self.0.borrow_mut().closed += 1;
    }
}

struct MockListener(SharedLog);

impl Listener<String> for MockListener {
    fn on_remote_op(&mut self, op: &String) {
        self.0.borrow_mut().remote.push(op.clone());
    }

    fn on_ack(&mut self, op: &String, clean: bool) {
        self.0.borrow_mut().acks.push((op.clone(), clean));
    }

    fn on_error(&mut self, error: &Error) {
        self.0.borrow_mut().errors.push(error.to_string());
    }
}

/// Backoff that always waits [`BACKOFF`].
struct FixedBackoff(SharedLog);

impl Backoff for FixedBackoff {
    fn next_delay(&mut self) -> Duration {
        self.0.borrow_mut().delays += 1;
        BACKOFF
    }

    fn reset(&mut self) {
        self.0.borrow_mut().resets += 1;
    }
}

/// Marks every operation that crossed a concurrent one with a `'`.
///
/// Rejects any batch containing `"!reject"`.
pub struct PrimeTransformer;

impl Transformer<String> for PrimeTransformer {
    fn transform(
        &self,
        client_ops: Vec<String>,
        server_ops: Vec<String>,
    ) -> Result<Transformed<String>, TransformError> {
        if client_ops.iter().chain(&server_ops).any(|op| op == "!reject") {
            return Err(TransformError::new("rejected"));
        }
        let prime = |ops: Vec<String>| -> Vec<String> {
            ops.into_iter().map(|op| format!("{op}'")).collect()
        };
        Ok(Transformed {
            client_ops: prime(client_ops),
            server_ops: prime(server_ops),
        })
    }
}

/// A channel wired to recording mocks and a manual scheduler.
pub struct Harness {
    pub channel: OperationChannel<String, PrimeTransformer>,
    pub scheduler: ManualScheduler<String>,
    pub log: SharedLog,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        let log = SharedLog::default();
        let scheduler = ManualScheduler::new();
        let channel = OperationChannel::new(
            PrimeTransformer,
            Collaborators {
                send: Box::new(MockSend(log.clone())),
                receive: Box::new(MockReceive(log.clone())),
                scheduler: Box::new(scheduler.clone()),
                backoff: Box::new(FixedBackoff(log.clone())),
                listener: Box::new(MockListener(log.clone())),
            },
        );
        Harness {
            channel,
            scheduler,
            log,
        }
    }

    /// A channel connected at `revision` as `session`.
    pub fn connected(revision: u64, session: &str) -> Self {
        let mut harness = Self::new();
        harness.connect(revision, session);
        harness
    }

    pub fn connect(&mut self, revision: u64, session: &str) {
        self.channel
            .connect(Revision::new(revision), SessionId::new(session).unwrap())
            .unwrap();
    }

    /// Handles every queued task, including delayed ones.
    pub fn run(&mut self) -> usize {
        self.scheduler.run_until_idle(&mut self.channel, 1000)
    }

    pub fn send(&mut self, op: &str) {
        self.channel.send(op.to_string()).unwrap();
    }

    pub fn revision(&self) -> u64 {
        self.channel.revision().unwrap().get()
    }

    pub fn last_submit(&self) -> (Token, Revision, Vec<String>) {
        self.log.borrow().submits.last().cloned().unwrap()
    }

    pub fn submit_count(&self) -> usize {
        self.log.borrow().submits.len()
    }

    pub fn connection(&self) -> Token {
        self.log.borrow().opened.last().unwrap().0
    }

    pub fn acks(&self) -> Vec<(String, bool)> {
        self.log.borrow().acks.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.log.borrow().errors.clone()
    }

    /// Answers the most recent submit.
    pub fn respond_submit(&mut self, result: Result<u64, ServiceError>) {
        let token = self.last_submit().0;
        self.channel.handle(Event::SubmitResponse {
            token,
            result: result.map(Revision::new),
        });
    }

    /// Answers the most recent probe.
    pub fn respond_probe(&mut self, result: Result<u64, ServiceError>) {
        let token = *self.log.borrow().probes.last().unwrap();
        self.channel.handle(Event::ProbeResponse {
            token,
            result: result.map(Revision::new),
        });
    }

    /// Delivers an operation applied by `session` at `revision` on the live connection.
    pub fn deliver(&mut self, revision: u64, session: &str, op: &str) {
        let connection = self.connection();
        self.deliver_on(connection, revision, session, op);
    }

    pub fn deliver_on(&mut self, connection: Token, revision: u64, session: &str, op: &str) {
        let delivery = Delivery::new(
            Revision::new(revision),
            SessionId::new(session).unwrap(),
            op.to_string(),
        );
        self.channel.handle(Event::Incoming {
            connection,
            message: Ok(delivery),
        });
    }
}
