// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tracks which fields of the active medium are being edited locally.
//!
//! While a field is in the editing set, incoming snapshots must not
//! overwrite it on the medium at `current_index`. Everything else stays
//! live.

use std::collections::BTreeSet;

use crate::medium::FieldPath;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditGuard {
    current_index: Option<usize>,
    editing: BTreeSet<FieldPath>,
}

impl EditGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Makes `index` the active medium.
    ///
    /// Switching to a different medium abandons the previous medium's edit
    /// set. Returns true if the index changed.
    pub fn select(&mut self, index: Option<usize>) -> bool {
        if self.current_index == index {
            return false;
        }
        self.current_index = index;
        self.editing.clear();
        true
    }

    pub fn start_editing(&mut self, field: FieldPath) {
        self.editing.insert(field);
    }

    /// Returns true if the field was being edited.
    pub fn stop_editing(&mut self, field: &FieldPath) -> bool {
        self.editing.remove(field)
    }

    pub fn is_field_editing(&self, field: &FieldPath) -> bool {
        self.editing.contains(field)
    }

    pub fn is_editing(&self) -> bool {
        !self.editing.is_empty()
    }

    /// True when edits are in progress on the medium at `index`.
    pub fn protects(&self, index: usize) -> bool {
        self.is_editing() && self.current_index == Some(index)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldPath> {
        self.editing.iter()
    }

    /// Forgets both the active index and every edit.
    pub fn reset(&mut self) {
        self.current_index = None;
        self.editing.clear();
    }
}

#[cfg(test)]
#[path = "edit_guard_tests.rs"]
mod tests;
