// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local medium list kept in sync with the backend.
//!
//! The [`RecordSyncEngine`] applies pushed updates through the edit guard
//! merge rules, writes local changes optimistically and rolls them back
//! when the backend rejects them, and coalesces rapid edits per medium
//! index into a single outbound command.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::time::Duration;

use gp_core::protocol::{Command, EventMessage};
use gp_core::{EditGuard, FieldPath, Medium, MediumPatch, Merge, MergeOutcome, PanelEvent};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// Anything that can deliver a command and await its acknowledgement.
pub trait CommandSink: Send + Sync {
    fn send_command(&self, command: Command) -> CommandFuture<'_>;
}

/// Timing for deferred work.
#[derive(Debug, Clone)]
pub struct RecordOptions {
    /// Quiet period before a debounced patch is sent.
    pub debounce: Duration,
    /// Delay used by [`RecordSyncEngine::stop_editing_deferred`].
    pub stop_editing_delay: Duration,
}

impl RecordOptions {
    pub fn from_config(config: &Config) -> Self {
        RecordOptions {
            debounce: config.editing.debounce(),
            stop_editing_delay: config.editing.stop_editing_delay(),
        }
    }
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Options for [`RecordSyncEngine::update_record`].
#[derive(Debug, Clone, Copy)]
pub struct UpdateOptions {
    /// Release the patched fields from the edit guard once acknowledged.
    pub stop_editing_on_success: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        UpdateOptions {
            stop_editing_on_success: true,
        }
    }
}

/// Published view of the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordsView {
    pub room: Option<String>,
    pub records: Vec<Medium>,
    pub current_index: Option<usize>,
    pub editing: Vec<FieldPath>,
    /// True until the first full list for the room arrives.
    pub loading: bool,
    /// Last failure of a debounced write.
    pub error: Option<String>,
}

struct Pending {
    seq: u64,
    patch: MediumPatch,
    timer: JoinHandle<()>,
}

struct DeferredStop {
    seq: u64,
    timer: JoinHandle<()>,
}

struct State {
    room: Option<String>,
    /// Bumped on room change and shutdown; in-flight work from an older
    /// epoch leaves local state alone.
    epoch: u64,
    records: Vec<Medium>,
    guard: EditGuard,
    loading: bool,
    error: Option<String>,
    next_seq: u64,
    pending: HashMap<usize, Pending>,
    deferred_stops: HashMap<FieldPath, DeferredStop>,
}

impl State {
    fn new() -> Self {
        State {
            room: None,
            epoch: 0,
            records: Vec::new(),
            guard: EditGuard::new(),
            loading: false,
            error: None,
            next_seq: 0,
            pending: HashMap::new(),
            deferred_stops: HashMap::new(),
        }
    }

    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn cancel_deferred_stop(&mut self, field: &FieldPath) {
        if let Some(stop) = self.deferred_stops.remove(field) {
            stop.timer.abort();
        }
    }

    fn abort_timers(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.timer.abort();
        }
        for (_, stop) in self.deferred_stops.drain() {
            stop.timer.abort();
        }
    }

    fn view(&self) -> RecordsView {
        RecordsView {
            room: self.room.clone(),
            records: self.records.clone(),
            current_index: self.guard.current_index(),
            editing: self.guard.fields().cloned().collect(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}

struct Inner {
    sink: Arc<dyn CommandSink>,
    options: RecordOptions,
    state: Mutex<State>,
    view: watch::Sender<RecordsView>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.state.get_mut().abort_timers();
    }
}

/// Handle to the record engine. Clones share the same state.
#[derive(Clone)]
pub struct RecordSyncEngine {
    inner: Arc<Inner>,
}

impl RecordSyncEngine {
    pub fn new(sink: Arc<dyn CommandSink>, options: RecordOptions) -> Self {
        let state = State::new();
        let (view, _) = watch::channel(state.view());
        RecordSyncEngine {
            inner: Arc::new(Inner {
                sink,
                options,
                state: Mutex::new(state),
                view,
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| RecordSyncEngine { inner })
    }

    fn publish(&self, state: &State) {
        self.inner.view.send_replace(state.view());
    }

    pub fn view(&self) -> RecordsView {
        self.inner.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<RecordsView> {
        self.inner.view.subscribe()
    }

    pub fn records(&self) -> Vec<Medium> {
        self.inner.state.lock().records.clone()
    }

    pub fn room(&self) -> Option<String> {
        self.inner.state.lock().room.clone()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.inner.state.lock().guard.current_index()
    }

    /// Switches to `room` and starts over with an empty, loading list.
    ///
    /// Pending debounced writes and deferred stops are abandoned.
    pub fn set_room(&self, room: impl Into<String>) {
        let room = room.into();
        let mut state = self.inner.state.lock();
        state.abort_timers();
        state.epoch += 1;
        state.records.clear();
        state.guard.reset();
        state.loading = true;
        state.error = None;
        info!(room = %room, "room selected");
        state.room = Some(room);
        self.publish(&state);
    }

    /// Aborts every timer. In-flight writes no longer touch local state.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        state.abort_timers();
        state.epoch += 1;
        debug!("record engine shut down");
    }

    /// Makes `index` the active medium. Returns true if it changed.
    pub fn select_record(&self, index: Option<usize>) -> bool {
        let mut state = self.inner.state.lock();
        if !state.guard.select(index) {
            return false;
        }
        for (_, stop) in state.deferred_stops.drain() {
            stop.timer.abort();
        }
        debug!(?index, "medium selected");
        self.publish(&state);
        true
    }

    pub fn start_editing(&self, field: FieldPath) {
        let mut state = self.inner.state.lock();
        state.cancel_deferred_stop(&field);
        state.guard.start_editing(field);
        self.publish(&state);
    }

    pub fn stop_editing(&self, field: &FieldPath) {
        let mut state = self.inner.state.lock();
        state.cancel_deferred_stop(field);
        if state.guard.stop_editing(field) {
            self.publish(&state);
        }
    }

    pub fn is_field_editing(&self, field: &FieldPath) -> bool {
        self.inner.state.lock().guard.is_field_editing(field)
    }

    /// Stops editing `field` after the configured delay.
    pub fn stop_editing_deferred(&self, field: FieldPath) {
        self.stop_editing_after(field, self.inner.options.stop_editing_delay);
    }

    /// Stops editing `field` after `delay`, giving in-flight writes time to
    /// land. Editing the field again before then cancels the stop.
    pub fn stop_editing_after(&self, field: FieldPath, delay: Duration) {
        let mut state = self.inner.state.lock();
        state.cancel_deferred_stop(&field);
        let seq = state.seq();
        let weak = Arc::downgrade(&self.inner);
        let target = field.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(engine) = Self::from_weak(&weak) else {
                return;
            };
            let mut state = engine.inner.state.lock();
            if state.deferred_stops.get(&target).map(|s| s.seq) != Some(seq) {
                return;
            }
            state.deferred_stops.remove(&target);
            if state.guard.stop_editing(&target) {
                debug!(field = %target, "deferred stop editing");
                engine.publish(&state);
            }
        });
        state.deferred_stops.insert(field, DeferredStop { seq, timer });
    }

    /// Applies a pushed event to the local list.
    pub fn handle_event(&self, event: PanelEvent) -> MergeOutcome {
        let mut lock = self.inner.state.lock();
        let state = &mut *lock;
        if state.room.as_deref() != Some(event.room()) {
            debug!(room = event.room(), "ignoring update for another room");
            return MergeOutcome::Ignored;
        }
        let outcome = match event {
            PanelEvent::MediumsUpdate { mediums, .. } => {
                state.loading = false;
                state.records.merge_all(mediums, &state.guard)
            }
            PanelEvent::MediumUpdate { medium, .. } => {
                state.records.merge_one(medium, &state.guard)
            }
        };
        if outcome.avoided_conflict() {
            debug!(?outcome, "kept local edits over pushed update");
        } else {
            debug!(?outcome, count = state.records.len(), "mediums merged");
        }
        self.publish(state);
        outcome
    }

    /// Parses and applies a raw event. Unrelated or malformed events yield
    /// `None`.
    pub fn handle_message(&self, message: &EventMessage) -> Option<MergeOutcome> {
        match PanelEvent::parse(&message.event_type, &message.data) {
            Ok(Some(event)) => Some(self.handle_event(event)),
            Ok(None) => None,
            Err(e) => {
                warn!(event_type = %message.event_type, error = %e, "dropping malformed event");
                None
            }
        }
    }

    /// Applies `patch` locally, sends it and waits for the acknowledgement.
    ///
    /// On failure every patched field that still holds the optimistic value
    /// is restored from before the write; fields a later push changed keep
    /// the pushed value. The error is returned.
    pub async fn update_record(
        &self,
        index: usize,
        patch: MediumPatch,
        options: UpdateOptions,
    ) -> Result<()> {
        let (command, snapshot, optimistic, epoch) = {
            let mut state = self.inner.state.lock();
            let room = state
                .room
                .clone()
                .ok_or_else(|| Error::Config("no room selected".to_string()))?;
            let record = state
                .records
                .get_mut(index)
                .ok_or(Error::MediumNotFound(index))?;
            let snapshot = record.clone();
            record.apply_patch(&patch);
            let optimistic = record.clone();
            let command = Command::update_medium(&room, index, snapshot.name(), &patch);
            let epoch = state.epoch;
            self.publish(&state);
            (command, snapshot, optimistic, epoch)
        };
        debug!(index, fields = patch.len(), "sending medium update");

        let result = self.inner.sink.send_command(command).await;

        let mut state = self.inner.state.lock();
        if state.epoch != epoch {
            debug!(index, "room changed during update, local state left alone");
            return result.map(|_| ());
        }
        match result {
            Ok(_) => {
                if options.stop_editing_on_success {
                    for field in patch.fields() {
                        state.cancel_deferred_stop(&field);
                        state.guard.stop_editing(&field);
                    }
                }
                self.publish(&state);
                Ok(())
            }
            Err(e) => {
                if let Some(record) = state.records.get_mut(index) {
                    let mut restored = 0;
                    for field in patch.fields() {
                        if record.get(&field) == optimistic.get(&field) {
                            record.copy_field_from(&snapshot, &field);
                            restored += 1;
                        }
                    }
                    info!(index, restored, error = %e, "medium update failed, rolled back");
                } else {
                    warn!(index, error = %e, "medium update failed, medium gone");
                }
                self.publish(&state);
                Err(e)
            }
        }
    }

    /// Queues `patch` for `index` behind the configured debounce.
    pub fn debounced_update(&self, index: usize, patch: MediumPatch) {
        self.debounced_update_after(index, patch, self.inner.options.debounce);
    }

    /// Folds `patch` into the pending patch for `index` and restarts its
    /// timer. When the timer fires the accumulated patch is sent once.
    pub fn debounced_update_after(&self, index: usize, patch: MediumPatch, delay: Duration) {
        let mut state = self.inner.state.lock();
        let merged = match state.pending.remove(&index) {
            Some(pending) => {
                pending.timer.abort();
                let mut merged = pending.patch;
                merged.merge(patch);
                merged
            }
            None => patch,
        };
        let seq = state.seq();
        let weak = Arc::downgrade(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(engine) = Self::from_weak(&weak) {
                engine.flush(index, seq).await;
            }
        });
        state.pending.insert(
            index,
            Pending {
                seq,
                patch: merged,
                timer,
            },
        );
    }

    async fn flush(&self, index: usize, seq: u64) {
        let (patch, epoch) = {
            let mut state = self.inner.state.lock();
            if state.pending.get(&index).map(|p| p.seq) != Some(seq) {
                return;
            }
            let Some(pending) = state.pending.remove(&index) else {
                return;
            };
            (pending.patch, state.epoch)
        };

        // Fields stay guarded; the caller releases them after blur.
        let options = UpdateOptions {
            stop_editing_on_success: false,
        };
        let result = self.update_record(index, patch, options).await;

        let mut state = self.inner.state.lock();
        if state.epoch != epoch {
            return;
        }
        match result {
            Ok(()) => state.error = None,
            Err(e) => {
                warn!(index, error = %e, "debounced update failed");
                state.error = Some(e.to_string());
            }
        }
        self.publish(&state);
    }

    /// Number of indexes with a debounced write waiting.
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
