// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Panel orchestration.
//!
//! A [`Panel`] owns one [`ConnectionSession`] and wires it to the
//! [`EntityStore`] and the [`RecordSyncEngine`]. Every fresh connection
//! gets new subscriptions; the previous ones are dropped, which
//! unsubscribes them.

use std::sync::Arc;

use gp_core::protocol::{EventMessage, MEDIUMS_UPDATE_EVENT, MEDIUM_UPDATE_EVENT};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connection::{
    ConnectionSession, Connector, SessionOptions, SessionStatus, Subscription,
};
use crate::credentials::CredentialGate;
use crate::entities::{EntityFeed, EntityStore};
use crate::error::Result;
use crate::records::{CommandSink, RecordOptions, RecordSyncEngine};
use crate::rest::StatesSource;

/// Subscriptions bound to one transport generation.
struct Feeds {
    _entities: EntityFeed,
    events: JoinHandle<()>,
}

impl Drop for Feeds {
    fn drop(&mut self) {
        self.events.abort();
    }
}

#[derive(Default)]
struct Runtime {
    supervisor: Option<JoinHandle<()>>,
    stopped: bool,
}

pub struct Panel {
    session: ConnectionSession,
    entities: EntityStore,
    records: RecordSyncEngine,
    room: Option<String>,
    states: Option<Arc<dyn StatesSource>>,
    runtime: Mutex<Runtime>,
}

impl Panel {
    pub fn new(config: &Config, gate: Arc<CredentialGate>, connector: Arc<dyn Connector>) -> Self {
        let session = ConnectionSession::new(
            SessionOptions::from_config(config),
            gate,
            connector,
        );
        let sink: Arc<dyn CommandSink> = Arc::new(session.clone());
        let records = RecordSyncEngine::new(sink, RecordOptions::from_config(config));
        Panel {
            session,
            entities: EntityStore::new(),
            records,
            room: config.room.clone(),
            states: None,
            runtime: Mutex::new(Runtime::default()),
        }
    }

    /// Seeds the entity store from `source` each time the session connects,
    /// before the push subscription.
    pub fn with_states_source(mut self, source: Arc<dyn StatesSource>) -> Self {
        self.states = Some(source);
        self
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn records(&self) -> &RecordSyncEngine {
        &self.records
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn set_room(&self, room: impl Into<String>) {
        self.records.set_room(room);
    }

    /// Starts connecting and keeps the stores fed until [`Panel::shutdown`].
    pub fn start(&self) {
        let mut runtime = self.runtime.lock();
        if runtime.supervisor.is_some() || runtime.stopped {
            return;
        }
        if let Some(room) = &self.room {
            self.records.set_room(room.clone());
        }

        let states = self.states.clone();
        let supervisor = Supervisor {
            session: self.session.clone(),
            entities: self.entities.clone(),
            records: self.records.clone(),
        };
        let status = self.session.watch_status();
        runtime.supervisor = Some(tokio::spawn(supervisor.run(states, status)));
        self.session.start();
        info!(room = ?self.room, "panel started");
    }

    pub async fn set_online(&self, online: bool) {
        self.session.set_online(online).await;
    }

    pub async fn set_visible(&self, visible: bool) {
        self.session.set_visible(visible).await;
    }

    /// Drops every subscription, aborts every timer and closes the
    /// transport.
    pub fn shutdown(&self) {
        let mut runtime = self.runtime.lock();
        if runtime.stopped {
            return;
        }
        runtime.stopped = true;
        if let Some(supervisor) = runtime.supervisor.take() {
            supervisor.abort();
        }
        self.records.shutdown();
        self.session.stop();
        info!("panel shut down");
    }
}

impl Drop for Panel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Supervisor {
    session: ConnectionSession,
    entities: EntityStore,
    records: RecordSyncEngine,
}

impl Supervisor {
    async fn run(
        self,
        states: Option<Arc<dyn StatesSource>>,
        mut status: watch::Receiver<SessionStatus>,
    ) {
        let mut generation = 0;
        let mut feeds: Option<Feeds> = None;
        loop {
            let current = status.borrow_and_update().clone();
            if !current.is_connected() {
                if feeds.take().is_some() {
                    debug!("connection down, feeds dropped");
                }
            } else if current.generation != generation {
                generation = current.generation;
                feeds = None;
                // Seed before subscribing so REST never overwrites a newer
                // pushed snapshot.
                if let Some(states) = &states {
                    self.entities.bootstrap(states.as_ref()).await;
                }
                match self.subscribe().await {
                    Ok(live) => {
                        info!(generation, "subscribed to push updates");
                        feeds = Some(live);
                    }
                    Err(e) => warn!(generation, error = %e, "subscription failed"),
                }
            }
            if status.changed().await.is_err() {
                break;
            }
        }
    }

    async fn subscribe(&self) -> Result<Feeds> {
        let entities = self.session.subscribe_entities().await?;
        let mediums = self.session.subscribe_events(MEDIUMS_UPDATE_EVENT).await?;
        let medium = self.session.subscribe_events(MEDIUM_UPDATE_EVENT).await?;
        let events = tokio::spawn(pump_events(self.records.clone(), mediums, medium));
        Ok(Feeds {
            _entities: self.entities.attach(entities),
            events,
        })
    }
}

async fn pump_events(
    records: RecordSyncEngine,
    mut mediums: Subscription<EventMessage>,
    mut medium: Subscription<EventMessage>,
) {
    loop {
        let message = tokio::select! {
            Some(message) = mediums.recv() => message,
            Some(message) = medium.recv() => message,
            else => break,
        };
        records.handle_message(&message);
    }
    debug!("event streams ended");
}

#[cfg(test)]
#[path = "panel_tests.rs"]
mod tests;
