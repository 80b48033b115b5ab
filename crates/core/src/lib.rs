// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! oc-core: building blocks for the operation channel.
//!
//! This crate provides the data types, the transform queue, and the
//! retry primitives shared by the channel state machine and the
//! simulation tooling. Nothing in here performs I/O or scheduling.

pub mod backoff;
pub mod config;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod revision;
pub mod transform;

#[cfg(test)]
mod test_helpers;

pub use backoff::{Backoff, ExponentialBackoff};
pub use config::{BackoffConfig, ChannelConfig};
pub use error::{Error, Result};
pub use protocol::{Delivery, ServiceError, Token};
pub use queue::{QueueError, TransformQueue};
pub use revision::{Revision, SessionId};
pub use transform::{TransformError, Transformed, Transformer};
