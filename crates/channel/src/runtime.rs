// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Running a channel on tokio.
//!
//! The channel itself stays single-threaded: every event goes through one
//! unbounded mpsc channel and is handled by whoever awaits [`drive`].
//! Delayed tasks are spawned sleeps that post into the same channel.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use oc_core::{Token, Transformer};

use crate::channel::OperationChannel;
use crate::scheduler::{Event, Scheduler, Task};

/// Sender half handed to collaborators that complete requests.
pub type EventSender<M> = mpsc::UnboundedSender<Event<M>>;

/// Receiver half consumed by [`drive`].
pub type EventReceiver<M> = mpsc::UnboundedReceiver<Event<M>>;

/// Create the event channel a [`TokioScheduler`] and its collaborators share.
pub fn event_channel<M>() -> (EventSender<M>, EventReceiver<M>) {
    mpsc::unbounded_channel()
}

/// Scheduler posting tasks into a tokio event channel.
///
/// Must be used from within a tokio runtime.
pub struct TokioScheduler<M> {
    events: EventSender<M>,
    delayed: HashMap<Token, CancellationToken>,
}

impl<M> TokioScheduler<M> {
    pub fn new(events: EventSender<M>) -> Self {
        TokioScheduler {
            events,
            delayed: HashMap::new(),
        }
    }

    /// Number of delayed tasks not yet fired or cancelled.
    pub fn delayed_len(&self) -> usize {
        self.delayed.values().filter(|c| !c.is_cancelled()).count()
    }
}

impl<M: Send + 'static> Scheduler for TokioScheduler<M> {
    fn schedule(&mut self, task: Task) {
        if self.events.send(Event::Task(task)).is_err() {
            tracing::debug!(token = %task.id, "event channel closed, task dropped");
        }
    }

    fn schedule_after(&mut self, delay: Duration, task: Task) {
        self.delayed.retain(|_, cancel| !cancel.is_cancelled());

        let cancel = CancellationToken::new();
        let events = self.events.clone();
        let fired = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = fired.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    fired.cancel();
                    let _ = events.send(Event::Task(task));
                }
            }
        });
        self.delayed.insert(task.id, cancel);
    }

    fn cancel(&mut self, id: Token) {
        if let Some(cancel) = self.delayed.remove(&id) {
            cancel.cancel();
        }
    }
}

impl<M> Drop for TokioScheduler<M> {
    fn drop(&mut self) {
        for cancel in self.delayed.values() {
            cancel.cancel();
        }
    }
}

/// Feeds events into `channel` until `done` holds.
///
/// Returns false if every sender went away first.
pub async fn drive_until<M, X, F>(
    channel: &mut OperationChannel<M, X>,
    events: &mut EventReceiver<M>,
    mut done: F,
) -> bool
where
    M: Clone,
    X: Transformer<M>,
    F: FnMut(&OperationChannel<M, X>) -> bool,
{
    while !done(channel) {
        match events.recv().await {
            Some(event) => channel.handle(event),
            None => return false,
        }
    }
    true
}

/// Feeds events into `channel` until it disconnects or every sender is gone.
pub async fn drive<M, X>(channel: &mut OperationChannel<M, X>, events: &mut EventReceiver<M>)
where
    M: Clone,
    X: Transformer<M>,
{
    drive_until(channel, events, |c| !c.is_connected()).await;
    tracing::debug!("event loop stopped");
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
