// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! oc-channel: the client-side operation channel.
//!
//! An [`OperationChannel`] keeps one editor's document in step with a
//! server that totally orders every participant's operations. It batches
//! local edits, reconciles concurrent remote edits through a
//! [`Transformer`](oc_core::Transformer), and recovers from transport
//! failures without losing or duplicating an operation.

pub mod channel;
pub mod runtime;
pub mod scheduler;
pub mod service;
pub mod state;

#[cfg(test)]
mod test_helpers;

pub use channel::{ChannelStats, Collaborators, OperationChannel};
pub use runtime::{drive, drive_until, event_channel, TokioScheduler};
pub use scheduler::{Event, ManualScheduler, Scheduler, Task, TaskKind};
pub use service::{Listener, ReceiveChannel, SendService};
pub use state::ChannelState;
