// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::connection::TransportError;

/// All possible errors that can occur in the growpanel library.
///
/// Connection-level variants carry a user-facing message; the session
/// publishes the same text in its status.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed ({attempts}/{max})\n  hint: check the access token with 'growpanel login'")]
    Auth { attempts: u32, max: u32 },

    #[error("network error: {0}")]
    Network(String),

    #[error("command failed after {attempts} attempt(s): {source}")]
    Command {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("no medium at index {0}")]
    MediumNotFound(usize),

    #[error("credential store error: {0}")]
    Credentials(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Core(#[from] gp_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Returns true for errors that a retry may fix.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Command { .. } | Error::Transport(_) | Error::Http(_)
        )
    }
}

/// A specialized Result type for growpanel operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
