// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Channel states and the transitions allowed between them.
//!
//! ```text
//!  UNINITIALISED ──connect──► ALL_ACKED ──send──► WAITING_ACK
//!                                ▲  ▲               │   ▲
//!                         acked  │  └──── acked ────┘   │ resend
//!                                │                      │
//!                           DELAY_RESYNC ──timer──► WAITING_SYNC
//!                                ▲  └─── probe failed ───┘
//!                                └──── submit failed (from WAITING_ACK)
//! ```
//!
//! Every state may drop back to UNINITIALISED (disconnect or fatal error).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Observable state of an operation channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// Not connected. Initial state.
    Uninitialised,
    /// Connected, nothing in flight.
    AllAcked,
    /// A batch was submitted and awaits confirmation.
    WaitingAck,
    /// A submit or probe failed; a resync is scheduled after a backoff delay.
    DelayResync,
    /// A revision probe is outstanding.
    WaitingSync,
}

impl ChannelState {
    /// Returns the string representation used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelState::Uninitialised => "uninitialised",
            ChannelState::AllAcked => "all_acked",
            ChannelState::WaitingAck => "waiting_ack",
            ChannelState::DelayResync => "delay_resync",
            ChannelState::WaitingSync => "waiting_sync",
        }
    }

    /// Forward transitions out of this state, excluding the drop to
    /// [`ChannelState::Uninitialised`] that every state allows.
    pub fn valid_targets(&self) -> &'static [ChannelState] {
        use ChannelState::*;
        match self {
            Uninitialised => &[AllAcked],
            AllAcked => &[WaitingAck],
            WaitingAck => &[AllAcked, DelayResync],
            DelayResync => &[AllAcked, WaitingSync],
            WaitingSync => &[AllAcked, WaitingAck, DelayResync],
        }
    }

    /// Check if a transition from this state to `target` is allowed.
    pub fn can_transition_to(&self, target: ChannelState) -> bool {
        target == ChannelState::Uninitialised || self.valid_targets().contains(&target)
    }

    /// Check if a transition from `from` to `to` is allowed.
    pub fn is_valid_transition(from: ChannelState, to: ChannelState) -> bool {
        from.can_transition_to(to)
    }

    /// Returns true if the channel holds a session.
    pub fn is_connected(&self) -> bool {
        *self != ChannelState::Uninitialised
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
