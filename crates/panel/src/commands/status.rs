// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `status`: configuration validity and login state, without connecting.

use std::fmt;
use std::sync::Arc;

use crate::config::{Config, Environment};
use crate::credentials::{CredentialGate, CredentialStore};
use crate::error::Result;

/// Everything `status` prints.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub base_url: String,
    pub environment: Environment,
    pub room: Option<String>,
    /// Why the configuration is unusable, if it is.
    pub config_error: Option<String>,
    pub token_stored: bool,
    /// Why a connection could not be attempted, if it could not.
    pub credentials_error: Option<String>,
}

impl StatusReport {
    pub fn collect(config: &Config, gate: &CredentialGate) -> Self {
        StatusReport {
            base_url: config.base_url.clone(),
            environment: config.environment,
            room: config.room.clone(),
            config_error: config.validate().err().map(|e| e.to_string()),
            token_stored: gate.has_token(),
            credentials_error: gate.validate().err().map(|e| e.to_string()),
        }
    }

    /// True when `watch` would try to connect.
    pub fn ready(&self) -> bool {
        self.config_error.is_none() && self.credentials_error.is_none()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let environment = match self.environment {
            Environment::Production => "production",
            Environment::Development => "development",
        };
        writeln!(f, "Backend: {}", self.base_url)?;
        writeln!(f, "Environment: {}", environment)?;
        writeln!(f, "Room: {}", self.room.as_deref().unwrap_or("(none)"))?;
        match &self.config_error {
            Some(e) => writeln!(f, "Config: invalid ({})", e)?,
            None => writeln!(f, "Config: ok")?,
        }
        writeln!(
            f,
            "Token: {}",
            if self.token_stored { "stored" } else { "missing" }
        )?;
        match &self.credentials_error {
            Some(e) => write!(f, "Ready: no\n  {}", e),
            None => write!(f, "Ready: yes"),
        }
    }
}

pub fn run(config: &Config, store: Arc<dyn CredentialStore>) -> Result<()> {
    let gate = CredentialGate::from_env(config, store);
    println!("{}", StatusReport::collect(config, &gate));
    Ok(())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
