// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Medium records (one tracked plant / growing medium per record).
//!
//! A medium is a JSON object with a stable `name`, scalar plant fields and
//! a nested `dates` object whose entries are edited independently. Records
//! stay JSON-shaped so that fields the backend adds later survive a
//! round-trip untouched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Stable identity field of a medium.
pub const NAME: &str = "name";
/// Nested object holding the date fields.
pub const DATES: &str = "dates";

/// Well-known scalar fields.
pub mod fields {
    pub const PLANT_NAME: &str = "plant_name";
    pub const PLANT_STRAIN: &str = "plant_strain";
    pub const PLANT_STAGE: &str = "plant_stage";
    pub const PLANT_TYPE: &str = "plant_type";
    pub const MEDIUM_TYPE: &str = "medium_type";
}

/// Well-known `dates.*` fields.
pub mod date_fields {
    pub const GROWSTARTDATE: &str = "growstartdate";
    pub const BLOOMSWITCHDATE: &str = "bloomswitchdate";
    pub const BREEDERBLOOMDAYS: &str = "breederbloomdays";
    pub const HARVESTDATE: &str = "harvestdate";
}

/// Address of one editable field: `plant_name` or `dates.growstartdate`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldPath {
    Top(String),
    Date(String),
}

impl FieldPath {
    pub fn top(name: impl Into<String>) -> Self {
        FieldPath::Top(name.into())
    }

    pub fn date(name: impl Into<String>) -> Self {
        FieldPath::Date(name.into())
    }
}

impl FromStr for FieldPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once('.') {
            None if !s.is_empty() => Ok(FieldPath::Top(s.to_string())),
            Some((DATES, sub)) if !sub.is_empty() && !sub.contains('.') => {
                Ok(FieldPath::Date(sub.to_string()))
            }
            _ => Err(Error::InvalidFieldPath(s.to_string())),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Top(name) => write!(f, "{}", name),
            FieldPath::Date(name) => write!(f, "{}.{}", DATES, name),
        }
    }
}

/// One medium record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Medium(Map<String, Value>);

impl Medium {
    /// Creates an empty medium with the given identity.
    pub fn new(name: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(NAME.to_string(), Value::String(name.into()));
        Medium(map)
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Medium(map)
    }

    /// Builder-style setter, mostly for fixtures.
    pub fn with(mut self, field: &str, value: Value) -> Self {
        match field.parse::<FieldPath>() {
            Ok(path) => self.set(&path, value),
            Err(_) => {
                self.0.insert(field.to_string(), value);
            }
        }
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get(NAME).and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn dates(&self) -> Option<&Map<String, Value>> {
        self.0.get(DATES).and_then(Value::as_object)
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        match path {
            FieldPath::Top(name) => self.0.get(name),
            FieldPath::Date(name) => self.dates().and_then(|d| d.get(name)),
        }
    }

    /// Writes one field, creating the `dates` object when needed.
    pub fn set(&mut self, path: &FieldPath, value: Value) {
        match path {
            FieldPath::Top(name) => {
                self.0.insert(name.clone(), value);
            }
            FieldPath::Date(name) => self.extend_dates([(name.clone(), value)]),
        }
    }

    pub fn remove(&mut self, path: &FieldPath) -> Option<Value> {
        match path {
            FieldPath::Top(name) => self.0.remove(name),
            FieldPath::Date(name) => self
                .0
                .get_mut(DATES)
                .and_then(Value::as_object_mut)
                .and_then(|d| d.remove(name)),
        }
    }

    /// Copies `path` from `source`; a field absent in `source` is removed.
    pub fn copy_field_from(&mut self, source: &Medium, path: &FieldPath) {
        match source.get(path) {
            Some(value) => self.set(path, value.clone()),
            None => {
                self.remove(path);
            }
        }
    }

    /// Applies a patch; `dates` entries are merged into the existing
    /// `dates` object instead of replacing it.
    pub fn apply_patch(&mut self, patch: &MediumPatch) {
        for (key, value) in &patch.0 {
            match (key.as_str(), value) {
                (DATES, Value::Object(dates)) => {
                    self.extend_dates(dates.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                _ => {
                    self.0.insert(key.clone(), value.clone());
                }
            }
        }
    }

    fn extend_dates(&mut self, entries: impl IntoIterator<Item = (String, Value)>) {
        match self.0.get_mut(DATES) {
            Some(Value::Object(existing)) => existing.extend(entries),
            _ => {
                self.0
                    .insert(DATES.to_string(), Value::Object(entries.into_iter().collect()));
            }
        }
    }
}

/// Field changes for one medium, accumulated by key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediumPatch(Map<String, Value>);

impl MediumPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        MediumPatch(map)
    }

    /// Single-field patch.
    pub fn field(path: &FieldPath, value: Value) -> Self {
        let mut patch = Self::new();
        patch.set(path, value);
        patch
    }

    pub fn set(&mut self, path: &FieldPath, value: Value) {
        match path {
            FieldPath::Top(name) => {
                self.0.insert(name.clone(), value);
            }
            FieldPath::Date(name) => {
                let mut single = Map::new();
                single.insert(name.clone(), value);
                self.merge_dates(single);
            }
        }
    }

    /// Folds `other` into this patch; later values win per key and
    /// `dates` entries merge per date field.
    pub fn merge(&mut self, other: MediumPatch) {
        for (key, value) in other.0 {
            match value {
                Value::Object(dates) if key == DATES => self.merge_dates(dates),
                value => {
                    self.0.insert(key, value);
                }
            }
        }
    }

    /// Every field the patch touches; a `dates` object contributes both
    /// `dates` itself and each `dates.*` entry.
    pub fn fields(&self) -> Vec<FieldPath> {
        let mut out = Vec::new();
        for (key, value) in &self.0 {
            out.push(FieldPath::Top(key.clone()));
            if let (DATES, Value::Object(dates)) = (key.as_str(), value) {
                out.extend(dates.keys().map(|k| FieldPath::Date(k.clone())));
            }
        }
        out
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        match path {
            FieldPath::Top(name) => self.0.get(name),
            FieldPath::Date(name) => self
                .0
                .get(DATES)
                .and_then(Value::as_object)
                .and_then(|d| d.get(name)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn merge_dates(&mut self, dates: Map<String, Value>) {
        let entry = self
            .0
            .entry(DATES.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(existing) = entry {
            existing.extend(dates);
        } else {
            *entry = Value::Object(dates);
        }
    }
}

#[cfg(test)]
#[path = "medium_tests.rs"]
mod tests;
