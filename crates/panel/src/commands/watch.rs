// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `watch`: run the panel headless until interrupted.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::connection::{Connector, SessionStatus, WsConnector};
use crate::credentials::{CredentialGate, CredentialStore, Credentials};
use crate::error::{Error, Result};
use crate::panel::Panel;
use crate::rest::{RestClient, StatesSource};
use gp_core::ConnectionState;

pub fn run(config: Config, room: Option<String>, store: Arc<dyn CredentialStore>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch(
        config,
        room,
        store,
        Arc::new(WsConnector::new()),
        rest_states,
        interrupted(),
    ))
}

fn rest_states(credentials: &Credentials) -> Option<Arc<dyn StatesSource>> {
    match RestClient::new(credentials) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "REST client unavailable, entities wait for the push stream");
            None
        }
    }
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Follows `room` until `until` resolves or the session gives up.
///
/// `states` builds the source for the initial entity load.
pub async fn watch<S>(
    config: Config,
    room: Option<String>,
    store: Arc<dyn CredentialStore>,
    connector: Arc<dyn Connector>,
    states: S,
    until: impl Future<Output = ()>,
) -> Result<()>
where
    S: FnOnce(&Credentials) -> Option<Arc<dyn StatesSource>>,
{
    config.validate()?;
    let room = room.or_else(|| config.room.clone()).ok_or_else(|| {
        Error::Config("no room selected\n  hint: pass --room or set room in config.toml".to_string())
    })?;
    let config = Config {
        room: Some(room.clone()),
        ..config
    };
    let gate = Arc::new(CredentialGate::from_env(&config, store));
    let credentials = gate.validate()?;

    let mut panel = Panel::new(&config, gate, connector);
    if let Some(source) = states(&credentials) {
        panel = panel.with_states_source(source);
    }
    let mut status = panel.session().watch_status();
    let mut records = panel.records().watch();
    let mut entities = panel.entities().watch();
    let mut entity_count = 0;
    panel.start();

    tokio::pin!(until);
    let result = loop {
        tokio::select! {
            _ = &mut until => {
                info!("interrupted");
                break Ok(());
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = status.borrow_and_update().clone();
                info!(status = %current.status_string(), "connection");
                if let Some(err) = terminal_error(&current, config.reconnect.max_unauthorized_attempts) {
                    break Err(err);
                }
            }
            Ok(()) = records.changed() => {
                let view = records.borrow_and_update().clone();
                info!(
                    room = %room,
                    mediums = view.records.len(),
                    loading = view.loading,
                    "records updated"
                );
                if let Some(error) = &view.error {
                    warn!(error = %error, "last medium update failed");
                }
            }
            Ok(()) = entities.changed() => {
                let count = entities.borrow_and_update().len();
                if count != entity_count {
                    entity_count = count;
                    info!(count, "entities updated");
                }
            }
        }
    };

    panel.shutdown();
    result
}

/// The error `watch` exits with once the session needs intervention.
pub fn terminal_error(status: &SessionStatus, max_unauthorized: u32) -> Option<Error> {
    if !status.terminal && !status.redirect_to_config {
        return None;
    }
    let message = status
        .error
        .clone()
        .unwrap_or_else(|| status.state.as_str().to_string());
    Some(match status.state {
        ConnectionState::AuthError => Error::Auth {
            attempts: max_unauthorized,
            max: max_unauthorized,
        },
        _ if status.redirect_to_config => Error::Config(message),
        _ => Error::Network(message),
    })
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
