// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Backend entities (sensors, switches, numeric controls).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Last known state of one backend entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Unique identifier, e.g. `sensor.growroom_temperature`.
    pub entity_id: String,
    /// State rendered as a string by the backend.
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Entity identifier -> state. No ordering guarantee.
pub type EntitySnapshot = HashMap<String, EntityState>;

impl EntityState {
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        EntityState {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: Map::new(),
            last_changed: None,
            last_updated: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Domain part of the identifier (`sensor` in `sensor.temp`).
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map_or(self.entity_id.as_str(), |(domain, _)| domain)
    }

    /// Human-facing name, falling back to the identifier.
    pub fn friendly_name(&self) -> &str {
        self.attributes
            .get("friendly_name")
            .and_then(Value::as_str)
            .unwrap_or(self.entity_id.as_str())
    }

    /// Returns the state parsed as a number, if it is one.
    pub fn numeric_state(&self) -> Option<f64> {
        self.state.trim().parse().ok()
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.state.as_str(), "unavailable" | "unknown")
    }
}

/// Converts the REST array-of-records shape into the keyed map.
///
/// Later duplicates of the same identifier win.
pub fn snapshot_from_states(states: Vec<EntityState>) -> EntitySnapshot {
    states
        .into_iter()
        .map(|state| (state.entity_id.clone(), state))
        .collect()
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
