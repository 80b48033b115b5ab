// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Drives several simulated editors against one [`SimServer`].
//!
//! Each client owns an [`OperationChannel`] on its own [`ManualScheduler`].
//! The driver always handles whichever client event or editor action is
//! due first, so the whole run happens in one global virtual-time order
//! and is reproducible from the seed.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use oc_channel::{
    ChannelState, ChannelStats, Collaborators, Listener, ManualScheduler, OperationChannel,
};
use oc_core::{Error, ExponentialBackoff, Result, Revision, SessionId};

use crate::config::SimConfig;
use crate::doc::{CharTransformer, Edit, SimOp, TextDoc};
use crate::server::{ServerStats, SharedServer, SimReceiveChannel, SimSendService, SimServer};

/// Upper bound on handled events, in case a run never settles.
const MAX_EVENTS: usize = 1_000_000;

/// What one client's listener saw.
#[derive(Debug, Default)]
struct Record {
    acked: Vec<u64>,
    remote_ops: usize,
    errors: Vec<String>,
}

struct RecordingListener(Rc<RefCell<Record>>);

impl Listener<SimOp> for RecordingListener {
    fn on_remote_op(&mut self, _op: &SimOp) {
        self.0.borrow_mut().remote_ops += 1;
    }

    fn on_ack(&mut self, op: &SimOp, _clean: bool) {
        self.0.borrow_mut().acked.push(op.id);
    }

    fn on_error(&mut self, error: &Error) {
        self.0.borrow_mut().errors.push(error.to_string());
    }
}

struct Client {
    site: u32,
    session: SessionId,
    channel: OperationChannel<SimOp, CharTransformer>,
    scheduler: ManualScheduler<SimOp>,
    doc: TextDoc,
    record: Rc<RefCell<Record>>,
    next_id: u64,
    next_edit: Option<Duration>,
}

impl Client {
    /// Applies every transformed remote operation to the local document.
    fn drain(&mut self) {
        while let Ok(Some(op)) = self.channel.receive() {
            if let Err(e) = self.doc.apply(&op.edit) {
                tracing::error!(site = self.site, error = %e, "remote edit does not apply");
                self.record.borrow_mut().errors.push(e.to_string());
            }
        }
    }
}

/// Per-client outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ClientReport {
    pub site: u32,
    pub session: String,
    pub document: String,
    pub state: ChannelState,
    pub edits: u64,
    pub acked: usize,
    /// Every edit was acknowledged exactly once, in the order it was made.
    pub acks_in_order: bool,
    pub remote_ops: usize,
    pub errors: Vec<String>,
    pub stats: ChannelStats,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub seed: u64,
    /// Virtual time the run took, in milliseconds.
    pub elapsed_ms: u64,
    pub events: usize,
    /// The run reached quiescence before the event limit.
    pub settled: bool,
    pub revision: Revision,
    pub document: String,
    pub server: ServerStats,
    pub clients: Vec<ClientReport>,
    /// Every client's document equals the server's.
    pub converged: bool,
}

impl Report {
    /// True if the run settled, converged, and acknowledged every edit in order.
    pub fn is_success(&self) -> bool {
        self.settled
            && self.converged
            && self
                .clients
                .iter()
                .all(|c| c.acks_in_order && c.errors.is_empty())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "seed {}: {} events over {}ms, revision {}",
            self.seed, self.events, self.elapsed_ms, self.revision
        )?;
        writeln!(
            f,
            "server: {} submits, {} dropped before apply, {} dropped after apply, {} probes ({} failed)",
            self.server.submits,
            self.server.dropped_before_apply,
            self.server.dropped_after_apply,
            self.server.probes,
            self.server.failed_probes
        )?;
        for c in &self.clients {
            writeln!(
                f,
                "  {} [{}] acked {}/{} resends={} eager={} direct={} dup={}{}",
                c.session,
                c.state,
                c.acked,
                c.edits,
                c.stats.resends,
                c.stats.eager_acks,
                c.stats.direct_acks,
                c.stats.duplicate_acks,
                if c.acks_in_order { "" } else { " OUT OF ORDER" }
            )?;
            for e in &c.errors {
                writeln!(f, "    error: {e}")?;
            }
        }
        let verdict = if self.is_success() {
            "converged"
        } else if !self.settled {
            "did not settle"
        } else {
            "DIVERGED"
        };
        write!(f, "{verdict}: {} characters", self.document.chars().count())
    }
}

/// A configured run.
pub struct Simulation {
    config: SimConfig,
    server: SharedServer,
    clients: Vec<Client>,
    rng: StdRng,
}

impl Simulation {
    /// Builds the server and connects every client at revision zero.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let seed = config.workload.seed;
        let server = SimServer::shared(config.faults.clone(), seed);
        let mut clients = Vec::with_capacity(config.workload.clients);
        for i in 0..config.workload.clients {
            clients.push(Self::client(&config, &server, i)?);
        }
        Ok(Simulation {
            rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
            config,
            server,
            clients,
        })
    }

    fn client(config: &SimConfig, server: &SharedServer, i: usize) -> Result<Client> {
        let site = u32::try_from(i + 1).map_err(|_| Error::Config("too many clients".into()))?;
        let session = SessionId::new(format!("client-{site}"))?;
        let scheduler = ManualScheduler::new();
        let index = server.borrow_mut().attach(scheduler.clone());
        let record = Rc::new(RefCell::new(Record::default()));
        let backoff = ExponentialBackoff::with_seed(
            config.channel.backoff.clone(),
            config.workload.seed ^ (u64::from(site) << 32),
        );

        let mut channel = OperationChannel::new(
            CharTransformer,
            Collaborators {
                send: Box::new(SimSendService::new(server.clone(), index, session.clone())),
                receive: Box::new(SimReceiveChannel::new(server.clone(), index)),
                scheduler: Box::new(scheduler.clone()),
                backoff: Box::new(backoff),
                listener: Box::new(RecordingListener(record.clone())),
            },
        );
        channel.connect(Revision::ZERO, session.clone())?;

        Ok(Client {
            site,
            session,
            channel,
            scheduler,
            doc: TextDoc::new(),
            record,
            next_id: 0,
            next_edit: (config.workload.edits_per_client > 0).then_some(Duration::ZERO),
        })
    }

    fn edit_gap(&mut self) -> Duration {
        let mean = self.config.workload.edit_interval_ms;
        Duration::from_millis(self.rng.random_range(mean / 2..=mean + mean / 2))
    }

    /// Earliest pending work: (due, client, is an editor action).
    fn next_due(&self) -> Option<(Duration, usize, bool)> {
        let mut best: Option<(Duration, usize, bool)> = None;
        for (i, client) in self.clients.iter().enumerate() {
            let candidates = [
                client.scheduler.next_due().map(|t| (t, i, false)),
                client.next_edit.map(|t| (t, i, true)),
            ];
            for candidate in candidates.into_iter().flatten() {
                let earlier = match best {
                    Some(b) => candidate.0 < b.0,
                    None => true,
                };
                if earlier {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn edit(&mut self, i: usize, at: Duration) {
        let drain = self.rng.random_bool(self.config.workload.drain_probability);
        let insert = self.rng.random_bool(0.7);
        let roll: usize = self.rng.random_range(0..=usize::MAX / 2);
        let ch = char::from(b'a' + self.rng.random_range(0..26u8));
        let gap = self.edit_gap();
        let edits = self.config.workload.edits_per_client as u64;

        let client = &mut self.clients[i];
        client.scheduler.advance_to(at);
        if drain {
            client.drain();
        }

        let len = client.doc.len();
        let edit = if insert || len == 0 {
            Edit::Insert {
                pos: roll % (len + 1),
                ch,
            }
        } else {
            Edit::Delete { pos: roll % len }
        };
        let op = SimOp::new(client.next_id, client.site, edit);
        client.next_id += 1;
        client.next_edit = (client.next_id < edits).then_some(at + gap);

        if let Err(e) = client.doc.apply(&edit) {
            client.record.borrow_mut().errors.push(e.to_string());
            return;
        }
        if let Err(e) = client.channel.send(op) {
            tracing::error!(site = client.site, error = %e, "send failed");
            client.record.borrow_mut().errors.push(e.to_string());
        }
    }

    /// Runs until nothing is left to do and reports the outcome.
    pub fn run(mut self) -> Report {
        tracing::info!(
            clients = self.clients.len(),
            edits = self.config.workload.edits_per_client,
            seed = self.config.workload.seed,
            "starting simulation"
        );

        let mut events = 0;
        let mut now = Duration::ZERO;
        while let Some((due, i, is_edit)) = self.next_due() {
            if events >= MAX_EVENTS {
                tracing::warn!(events, "event limit reached");
                break;
            }
            events += 1;
            now = now.max(due);
            if is_edit {
                self.edit(i, due);
            } else {
                let client = &mut self.clients[i];
                if let Some(event) = client.scheduler.advance() {
                    client.channel.handle(event);
                }
            }
        }
        let settled = self.next_due().is_none();

        for client in &mut self.clients {
            client.drain();
        }
        self.report(events, now, settled)
    }

    fn report(&self, events: usize, now: Duration, settled: bool) -> Report {
        let server = self.server.borrow();
        let document = server.doc().to_string();

        let clients: Vec<ClientReport> = self
            .clients
            .iter()
            .map(|c| {
                let record = c.record.borrow();
                ClientReport {
                    site: c.site,
                    session: c.session.to_string(),
                    document: c.doc.to_string(),
                    state: c.channel.state(),
                    edits: c.next_id,
                    acked: record.acked.len(),
                    acks_in_order: record.acked.iter().copied().eq(0..c.next_id),
                    remote_ops: record.remote_ops,
                    errors: record.errors.clone(),
                    stats: *c.channel.stats(),
                }
            })
            .collect();

        let converged = clients
            .iter()
            .all(|c| c.document == document && c.state == ChannelState::AllAcked);
        if converged {
            tracing::info!(revision = %server.revision(), "all clients converged");
        } else {
            tracing::error!(revision = %server.revision(), "clients diverged");
        }

        Report {
            seed: self.config.workload.seed,
            elapsed_ms: u64::try_from(now.as_millis()).unwrap_or(u64::MAX),
            events,
            settled,
            revision: server.revision(),
            document,
            server: *server.stats(),
            clients,
            converged,
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
