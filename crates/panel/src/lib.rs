// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! growpanel - headless client for a grow-room control panel.
//!
//! This crate keeps a push connection to a home-automation backend and
//! mirrors two kinds of data:
//!
//! # Main Components
//!
//! - [`ConnectionSession`] - connection state machine with backoff and auth handling
//! - [`EntityStore`] - entity states, seeded over REST and fed by the push stream
//! - [`RecordSyncEngine`] - the room's medium records with edit protection,
//!   optimistic writes and debounced updates
//! - [`Panel`] - wires the three together and tears them down
//! - [`Config`] / [`CredentialGate`] - configuration and access tokens
//!
//! ```rust,ignore
//! use growpanel::{CredentialGate, Config, Panel, WsConnector};
//!
//! let config = Config::load_or_default(None)?;
//! let gate = Arc::new(CredentialGate::from_env(&config, store));
//! let panel = Panel::new(&config, gate, Arc::new(WsConnector::new()));
//! panel.start();
//! ```

mod cli;
mod commands;
mod logging;

pub mod config;
pub mod connection;
pub mod credentials;
pub mod entities;
pub mod env;
pub mod error;
pub mod panel;
pub mod records;
pub mod rest;

pub use cli::{Cli, Command};
pub use config::{default_state_dir, Config};
pub use connection::{ConnectionSession, SessionStatus, WsConnector};
pub use credentials::{CredentialGate, CredentialStore, FileCredentialStore};
pub use entities::EntityStore;
pub use error::{Error, Result};
pub use logging::setup_logging;
pub use panel::Panel;
pub use records::{RecordSyncEngine, RecordsView, UpdateOptions};

/// Runs one CLI invocation.
pub fn run(cli: Cli) -> Result<()> {
    setup_logging(cli.verbose, cli.log_file.as_deref());
    let config = Config::load_or_default(cli.config.as_deref())?;
    let store = commands::open_store(&default_state_dir());

    match cli.command {
        Command::Login { token } => commands::auth::login(&config, store.as_ref(), &token),
        Command::Logout => commands::auth::logout(&config, store.as_ref()),
        Command::Status => commands::status::run(&config, store),
        Command::Watch { room } => commands::watch::run(config, room, store),
    }
}
