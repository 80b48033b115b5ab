// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory server imposing a total order on every client's operations.
//!
//! The server keeps the authoritative history (its revision is the history
//! length), transforms each submitted batch against whatever was applied
//! since the batch's base, and relays every applied operation to every
//! open receive connection, including the author's. Responses and
//! deliveries land on each client's [`ManualScheduler`] after a random
//! latency; faults are drawn from a seeded RNG.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use oc_channel::{Event, ManualScheduler, ReceiveChannel, SendService};
use oc_core::{Delivery, Revision, ServiceError, SessionId, Token, Transformer};

use crate::config::FaultConfig;
use crate::doc::{CharTransformer, SimOp, TextDoc};

/// What the server did over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    pub submits: u64,
    pub applied_ops: u64,
    pub dropped_before_apply: u64,
    pub dropped_after_apply: u64,
    pub probes: u64,
    pub failed_probes: u64,
    pub rejected: u64,
    pub abandoned: u64,
}

/// One client's end of the network.
struct Link {
    scheduler: ManualScheduler<SimOp>,
    connection: Option<Token>,
    /// Due time of the latest delivery, so deliveries never overtake.
    last_delivery: Duration,
}

/// The authoritative document and its history.
pub struct SimServer {
    history: Vec<Delivery<SimOp>>,
    doc: TextDoc,
    links: Vec<Link>,
    faults: FaultConfig,
    rng: StdRng,
    stats: ServerStats,
}

/// Shared handle, as held by every client's collaborators.
pub type SharedServer = Rc<RefCell<SimServer>>;

impl SimServer {
    pub fn new(faults: FaultConfig, seed: u64) -> Self {
        SimServer {
            history: Vec::new(),
            doc: TextDoc::new(),
            links: Vec::new(),
            faults,
            rng: StdRng::seed_from_u64(seed),
            stats: ServerStats::default(),
        }
    }

    pub fn shared(faults: FaultConfig, seed: u64) -> SharedServer {
        Rc::new(RefCell::new(Self::new(faults, seed)))
    }

    /// Registers a client whose events go to `scheduler`; returns its index.
    pub fn attach(&mut self, scheduler: ManualScheduler<SimOp>) -> usize {
        self.links.push(Link {
            scheduler,
            connection: None,
            last_delivery: Duration::ZERO,
        });
        self.links.len() - 1
    }

    pub fn revision(&self) -> Revision {
        Revision::new(self.history.len() as u64)
    }

    pub fn doc(&self) -> &TextDoc {
        &self.doc
    }

    pub fn history(&self) -> &[Delivery<SimOp>] {
        &self.history
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    fn latency(&mut self) -> Duration {
        let min = self.faults.min_latency_ms;
        let max = self.faults.max_latency_ms;
        Duration::from_millis(self.rng.random_range(min..=max))
    }

    fn respond(&mut self, client: usize, event: Event<SimOp>) {
        let latency = self.latency();
        let link = &self.links[client];
        link.scheduler
            .deliver_at(link.scheduler.now() + latency, event);
    }

    /// Queues `history[index]` for `client` behind its earlier deliveries.
    fn relay(&mut self, client: usize, index: usize, now: Duration) {
        let latency = self.latency();
        let link = &mut self.links[client];
        let Some(connection) = link.connection else {
            return;
        };
        let at = (now + latency).max(link.last_delivery);
        link.last_delivery = at;
        link.scheduler.deliver_at(
            at,
            Event::Incoming {
                connection,
                message: Ok(self.history[index].clone()),
            },
        );
    }

    fn submit(
        &mut self,
        client: usize,
        session: &SessionId,
        token: Token,
        base: Revision,
        ops: Vec<SimOp>,
    ) {
        self.stats.submits += 1;
        let roll: f64 = self.rng.random();
        if roll < self.faults.drop_before_apply {
            self.stats.dropped_before_apply += 1;
            tracing::debug!(%session, %token, "dropping submit before apply");
            self.respond(
                client,
                Event::SubmitResponse {
                    token,
                    result: Err(ServiceError::retryable("request lost")),
                },
            );
            return;
        }

        let result = self.apply(client, session, base, ops);
        if result.is_ok() && roll < self.faults.drop_before_apply + self.faults.drop_after_apply {
            self.stats.dropped_after_apply += 1;
            tracing::debug!(%session, %token, "dropping response after apply");
            self.respond(
                client,
                Event::SubmitResponse {
                    token,
                    result: Err(ServiceError::retryable("response lost")),
                },
            );
            return;
        }
        self.respond(client, Event::SubmitResponse { token, result });
    }

    /// Transforms `ops` past everything applied since `base` and appends them.
    fn apply(
        &mut self,
        client: usize,
        session: &SessionId,
        base: Revision,
        ops: Vec<SimOp>,
    ) -> Result<Revision, ServiceError> {
        let start = usize::try_from(base.get()).unwrap_or(usize::MAX);
        if start > self.history.len() {
            self.stats.rejected += 1;
            return Err(ServiceError::fatal(format!(
                "base revision {base} is ahead of server revision {}",
                self.revision()
            )));
        }

        let concurrent: Vec<SimOp> = self.history[start..]
            .iter()
            .map(|d| d.op.clone())
            .collect();
        let ops = match CharTransformer.transform(ops, concurrent) {
            Ok(transformed) => transformed.client_ops,
            Err(e) => {
                self.stats.rejected += 1;
                return Err(ServiceError::fatal(e.to_string()));
            }
        };

        let mut doc = self.doc.clone();
        for op in &ops {
            if let Err(e) = doc.apply(&op.edit) {
                self.stats.rejected += 1;
                return Err(ServiceError::fatal(e.to_string()));
            }
        }
        self.doc = doc;

        let now = self.links[client].scheduler.now();
        for op in ops {
            let revision = self.revision().next();
            self.history
                .push(Delivery::new(revision, session.clone(), op));
            self.stats.applied_ops += 1;
            let index = self.history.len() - 1;
            for target in 0..self.links.len() {
                self.relay(target, index, now);
            }
        }
        Ok(self.revision())
    }

    fn probe(&mut self, client: usize, token: Token) {
        self.stats.probes += 1;
        let result = if self.rng.random::<f64>() < self.faults.probe_failure {
            self.stats.failed_probes += 1;
            Err(ServiceError::retryable("probe timed out"))
        } else {
            Ok(self.revision())
        };
        self.respond(client, Event::ProbeResponse { token, result });
    }

    /// Starts relaying to `client` from `revision + 1`, catching up on history.
    fn open(&mut self, client: usize, connection: Token, revision: Revision) {
        let link = &mut self.links[client];
        link.connection = Some(connection);
        link.last_delivery = link.scheduler.now();
        let now = link.scheduler.now();

        let start = usize::try_from(revision.get()).unwrap_or(usize::MAX);
        for index in start..self.history.len() {
            self.relay(client, index, now);
        }
    }

    fn close(&mut self, client: usize) {
        self.links[client].connection = None;
    }
}

/// [`SendService`] backed by a [`SimServer`].
pub struct SimSendService {
    server: SharedServer,
    client: usize,
    session: SessionId,
}

impl SimSendService {
    pub fn new(server: SharedServer, client: usize, session: SessionId) -> Self {
        SimSendService {
            server,
            client,
            session,
        }
    }
}

impl SendService<SimOp> for SimSendService {
    fn submit_operations(&mut self, token: Token, base: Revision, ops: Vec<SimOp>) {
        self.server
            .borrow_mut()
            .submit(self.client, &self.session, token, base, ops);
    }

    fn request_revision(&mut self, token: Token) {
        self.server.borrow_mut().probe(self.client, token);
    }

    fn callback_not_needed(&mut self, _token: Token) {
        self.server.borrow_mut().stats.abandoned += 1;
    }
}

/// [`ReceiveChannel`] backed by a [`SimServer`].
pub struct SimReceiveChannel {
    server: SharedServer,
    client: usize,
}

impl SimReceiveChannel {
    pub fn new(server: SharedServer, client: usize) -> Self {
        SimReceiveChannel { server, client }
    }
}

impl ReceiveChannel for SimReceiveChannel {
    fn open(&mut self, connection: Token, revision: Revision) {
        self.server
            .borrow_mut()
            .open(self.client, connection, revision);
    }

    fn close(&mut self) {
        self.server.borrow_mut().close(self.client);
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
