// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative scheduling for the channel.
//!
//! Everything the channel reacts to is an [`Event`]: its own deferred
//! tasks, responses from the send service, and deliveries from the
//! receive channel. Events are handled one at a time, so the channel
//! never needs locking.
//!
//! [`ManualScheduler`] is a deterministic, virtual-time event queue. The
//! tokio-backed scheduler lives in [`crate::runtime`].

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

use oc_core::{Delivery, Revision, ServiceError, Token, Transformer};

use crate::channel::OperationChannel;

/// What a scheduled task does when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Transmit queued operations if nothing is in flight.
    MaybeSend,
    /// Probe the server's revision after a failure.
    Resync,
}

/// A task the channel asked to run later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    /// Token identifying this scheduling; stale tokens are ignored.
    pub id: Token,
    /// What to do.
    pub kind: TaskKind,
}

/// Input to [`OperationChannel::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event<M> {
    /// A scheduled task is due.
    Task(Task),
    /// Outcome of `SendService::submit_operations`.
    SubmitResponse {
        token: Token,
        result: Result<Revision, ServiceError>,
    },
    /// Outcome of `SendService::request_revision`.
    ProbeResponse {
        token: Token,
        result: Result<Revision, ServiceError>,
    },
    /// A delivery, or a failure, from the receive channel.
    Incoming {
        connection: Token,
        message: Result<Delivery<M>, ServiceError>,
    },
}

/// Runs channel tasks soon or after a delay.
pub trait Scheduler {
    /// Runs `task` as soon as the current event has been handled.
    fn schedule(&mut self, task: Task);

    /// Runs `task` after `delay`.
    fn schedule_after(&mut self, delay: Duration, task: Task);

    /// Cancels a scheduled task. Unknown ids are ignored.
    fn cancel(&mut self, id: Token);
}

/// Ordering key: due time, then insertion order.
type Slot = (Duration, u64);

/// Event queue with a virtual clock.
struct Timeline<M> {
    now: Duration,
    seq: u64,
    entries: BTreeMap<Slot, Event<M>>,
    tasks: HashMap<Token, Slot>,
}

impl<M> Timeline<M> {
    fn insert(&mut self, at: Duration, event: Event<M>) -> Slot {
        let slot = (at.max(self.now), self.seq);
        self.seq += 1;
        if let Event::Task(task) = &event {
            self.tasks.insert(task.id, slot);
        }
        self.entries.insert(slot, event);
        slot
    }

    fn pop(&mut self) -> Option<Event<M>> {
        let (slot, event) = self.entries.pop_first()?;
        self.now = self.now.max(slot.0);
        if let Event::Task(task) = &event {
            self.tasks.remove(&task.id);
        }
        Some(event)
    }
}

/// Deterministic scheduler driven by hand.
///
/// Cloning yields another handle to the same timeline, so simulated
/// network collaborators can deliver their responses into the queue the
/// channel schedules on.
pub struct ManualScheduler<M> {
    timeline: Rc<RefCell<Timeline<M>>>,
}

impl<M> Clone for ManualScheduler<M> {
    fn clone(&self) -> Self {
        ManualScheduler {
            timeline: Rc::clone(&self.timeline),
        }
    }
}

impl<M> Default for ManualScheduler<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ManualScheduler<M> {
    /// Creates an empty timeline at time zero.
    pub fn new() -> Self {
        ManualScheduler {
            timeline: Rc::new(RefCell::new(Timeline {
                now: Duration::ZERO,
                seq: 0,
                entries: BTreeMap::new(),
                tasks: HashMap::new(),
            })),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.timeline.borrow().now
    }

    /// Queues `event` behind everything already due now.
    pub fn deliver(&self, event: Event<M>) {
        let now = self.now();
        self.timeline.borrow_mut().insert(now, event);
    }

    /// Queues `event` to be handled `delay` from now.
    pub fn deliver_after(&self, delay: Duration, event: Event<M>) {
        let at = self.now() + delay;
        self.timeline.borrow_mut().insert(at, event);
    }

    /// Queues `event` at absolute virtual time `at` (or now, if `at` has passed).
    pub fn deliver_at(&self, at: Duration, event: Event<M>) {
        self.timeline.borrow_mut().insert(at, event);
    }

    /// Due time of the next event, if any.
    pub fn next_due(&self) -> Option<Duration> {
        self.timeline
            .borrow()
            .entries
            .first_key_value()
            .map(|(slot, _)| slot.0)
    }

    /// Removes the next event and moves the clock to its due time.
    pub fn advance(&self) -> Option<Event<M>> {
        self.timeline.borrow_mut().pop()
    }

    /// Moves the clock forward to `at` without handling anything.
    ///
    /// Events due before `at` stay queued and run next.
    pub fn advance_to(&self, at: Duration) {
        let mut timeline = self.timeline.borrow_mut();
        timeline.now = timeline.now.max(at);
    }

    /// Number of queued events.
    pub fn pending(&self) -> usize {
        self.timeline.borrow().entries.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Due time of the scheduled task of the given kind, if one is queued.
    pub fn scheduled(&self, kind: TaskKind) -> Option<Duration> {
        let timeline = self.timeline.borrow();
        timeline
            .entries
            .iter()
            .find(|(_, event)| matches!(event, Event::Task(task) if task.kind == kind))
            .map(|(slot, _)| slot.0)
    }

    /// Feeds queued events to `channel` until none are left.
    ///
    /// Returns the number of events handled, stopping early after `limit`.
    pub fn run_until_idle<X>(&self, channel: &mut OperationChannel<M, X>, limit: usize) -> usize
    where
        M: Clone,
        X: Transformer<M>,
    {
        let mut handled = 0;
        while handled < limit {
            let Some(event) = self.advance() else { break };
            channel.handle(event);
            handled += 1;
        }
        handled
    }

    /// Feeds events due within `duration` from now to `channel`, then moves
    /// the clock to the end of that window.
    pub fn run_for<X>(&self, channel: &mut OperationChannel<M, X>, duration: Duration) -> usize
    where
        M: Clone,
        X: Transformer<M>,
    {
        let deadline = self.now() + duration;
        let mut handled = 0;
        while self.next_due().is_some_and(|due| due <= deadline) {
            let Some(event) = self.advance() else { break };
            channel.handle(event);
            handled += 1;
        }
        let mut timeline = self.timeline.borrow_mut();
        timeline.now = timeline.now.max(deadline);
        handled
    }
}

impl<M> Scheduler for ManualScheduler<M> {
    fn schedule(&mut self, task: Task) {
        self.deliver(Event::Task(task));
    }

    fn schedule_after(&mut self, delay: Duration, task: Task) {
        self.deliver_after(delay, Event::Task(task));
    }

    fn cancel(&mut self, id: Token) {
        let mut timeline = self.timeline.borrow_mut();
        if let Some(slot) = timeline.tasks.remove(&id) {
            timeline.entries.remove(&slot);
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
