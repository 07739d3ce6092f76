// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Read-mostly store of backend entity states.
//!
//! The store is seeded once over REST and then replaced wholesale by each
//! snapshot the push stream delivers.

use std::sync::Arc;

use gp_core::{snapshot_from_states, EntitySnapshot, EntityState};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connection::Subscription;
use crate::rest::StatesSource;

/// Shared entity map. Clones share the same store.
#[derive(Clone)]
pub struct EntityStore {
    snapshot: Arc<watch::Sender<EntitySnapshot>>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(EntitySnapshot::new());
        EntityStore {
            snapshot: Arc::new(snapshot),
        }
    }

    /// Replaces the whole map.
    pub fn replace(&self, snapshot: EntitySnapshot) {
        debug!(count = snapshot.len(), "entity snapshot replaced");
        self.snapshot.send_replace(snapshot);
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn get(&self, entity_id: &str) -> Option<EntityState> {
        self.snapshot.borrow().get(entity_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.borrow().is_empty()
    }

    pub fn watch(&self) -> watch::Receiver<EntitySnapshot> {
        self.snapshot.subscribe()
    }

    /// Seeds the store from `source`. Failure is logged, not returned.
    pub async fn bootstrap(&self, source: &dyn StatesSource) -> bool {
        match source.fetch_states().await {
            Ok(states) => {
                info!(count = states.len(), "entity states loaded");
                self.replace(snapshot_from_states(states));
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to load entity states");
                false
            }
        }
    }

    /// Feeds every delivered snapshot into the store until the returned
    /// guard is dropped.
    pub fn attach(&self, mut subscription: Subscription<EntitySnapshot>) -> EntityFeed {
        let store = self.clone();
        let pump = tokio::spawn(async move {
            while let Some(snapshot) = subscription.recv().await {
                store.replace(snapshot);
            }
            debug!("entity stream ended");
        });
        EntityFeed { pump }
    }
}

/// Live entity feed. Dropping it stops the pump and unsubscribes.
pub struct EntityFeed {
    pump: JoinHandle<()>,
}

impl EntityFeed {
    /// True once the stream has ended on its own.
    pub fn is_finished(&self) -> bool {
        self.pump.is_finished()
    }
}

impl Drop for EntityFeed {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[cfg(test)]
#[path = "entities_tests.rs"]
mod tests;
