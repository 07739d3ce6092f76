// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! gp-core: Shared library for the growpanel client
//!
//! This crate provides the synchronous building blocks: the connection
//! state machine, reconnect backoff, entity and medium models, the edit
//! guard with its merge rules, and the push protocol messages.

pub mod backoff;
pub mod edit_guard;
pub mod entity;
pub mod error;
pub mod medium;
pub mod merge;
pub mod protocol;
pub mod state;

pub use backoff::{Backoff, BackoffPolicy};
pub use edit_guard::EditGuard;
pub use entity::{snapshot_from_states, EntitySnapshot, EntityState};
pub use error::{Error, Result};
pub use medium::{FieldPath, Medium, MediumPatch};
pub use merge::{Merge, MergeOutcome};
pub use protocol::{ClientMessage, Command, PanelEvent, ServerMessage, StateChange};
pub use state::{ConnectionState, Trigger};
