// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Merge server-pushed mediums into local state without clobbering edits.
//!
//! Merge rules:
//! - Full list, nothing being edited: replace the local list wholesale
//! - Full list while editing: replace everything, then splice the edited
//!   fields of the medium at `current_index` back from the local copy
//! - Single medium matching the edited one: drop it
//! - Single medium otherwise: replace by `name`, or append if unknown
//!
//! Mediums are matched to the edit guard by list index. A server-side
//! reorder during an edit splices onto whatever sits at that index.

use crate::edit_guard::EditGuard;
use crate::medium::{FieldPath, Medium};

/// What a merge did with an incoming update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Local state now equals the incoming data.
    Replaced,
    /// Incoming data applied except for fields under edit.
    Spliced {
        index: usize,
        preserved: Vec<FieldPath>,
    },
    /// Update discarded because its medium is being edited.
    Dropped { name: String },
    /// Unknown medium added at the end.
    Appended,
    /// Update carried no usable identity.
    Ignored,
}

impl MergeOutcome {
    /// Returns true if some incoming data was withheld to protect an edit.
    pub fn avoided_conflict(&self) -> bool {
        matches!(self, MergeOutcome::Spliced { .. } | MergeOutcome::Dropped { .. })
    }
}

/// Trait for applying pushed mediums under an edit guard.
pub trait Merge {
    /// Applies a full-list update.
    fn merge_all(&mut self, incoming: Vec<Medium>, guard: &EditGuard) -> MergeOutcome;

    /// Applies a single-medium update matched by `name`.
    fn merge_one(&mut self, incoming: Medium, guard: &EditGuard) -> MergeOutcome;
}

impl Merge for Vec<Medium> {
    fn merge_all(&mut self, incoming: Vec<Medium>, guard: &EditGuard) -> MergeOutcome {
        let index = match guard.current_index() {
            Some(index) if guard.is_editing() => index,
            _ => {
                *self = incoming;
                return MergeOutcome::Replaced;
            }
        };

        let mut merged = incoming;
        if index >= self.len() || index >= merged.len() {
            *self = merged;
            return MergeOutcome::Replaced;
        }

        let preserved: Vec<FieldPath> = guard.fields().cloned().collect();
        let local = &self[index];
        let target = &mut merged[index];
        for field in &preserved {
            target.copy_field_from(local, field);
        }
        *self = merged;
        MergeOutcome::Spliced { index, preserved }
    }

    fn merge_one(&mut self, incoming: Medium, guard: &EditGuard) -> MergeOutcome {
        let Some(name) = incoming.name().map(str::to_string) else {
            return MergeOutcome::Ignored;
        };

        match self.iter().position(|m| m.name() == Some(name.as_str())) {
            Some(index) if guard.protects(index) => MergeOutcome::Dropped { name },
            Some(index) => {
                self[index] = incoming;
                MergeOutcome::Replaced
            }
            None => {
                self.push(incoming);
                MergeOutcome::Appended
            }
        }
    }
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
