// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for gp-core operations.

use thiserror::Error;

/// All possible errors that can occur in gp-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid connection transition: cannot go from {from} on {trigger}\n  hint: from '{from}' the session accepts: {valid_triggers}")]
    InvalidTransition {
        from: String,
        trigger: String,
        valid_triggers: String,
    },

    #[error("invalid field path: '{0}'\n  hint: use a field name like 'plant_name' or 'dates.growstartdate'")]
    InvalidFieldPath(String),

    #[error("no medium at index {0}")]
    RecordNotFound(usize),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for gp-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
