// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicU32, Ordering};

use super::*;
use crate::connection::TransportError;
use crate::error::{Error, Result};
use crate::rest::StatesFuture;
use serde_json::json;
use tokio::sync::mpsc;

struct FixedStates(Result<Vec<EntityState>>);

impl StatesSource for FixedStates {
    fn fetch_states(&self) -> StatesFuture<'_> {
        let result = match &self.0 {
            Ok(states) => Ok(states.clone()),
            Err(_) => Err(Error::Transport(TransportError::Http { status: 502 })),
        };
        Box::pin(async move { result })
    }
}

fn snapshot(entries: &[(&str, &str)]) -> EntitySnapshot {
    snapshot_from_states(
        entries
            .iter()
            .map(|(id, state)| EntityState::new(*id, *state))
            .collect(),
    )
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn bootstrap_replaces_store() {
    let store = EntityStore::new();
    let source = FixedStates(Ok(vec![
        EntityState::new("sensor.temp", "24.5").with_attribute("friendly_name", json!("Temp")),
        EntityState::new("switch.light", "on"),
    ]));

    assert!(store.bootstrap(&source).await);

    assert_eq!(store.len(), 2);
    assert_eq!(store.get("sensor.temp").unwrap().friendly_name(), "Temp");
}

#[tokio::test]
async fn bootstrap_failure_is_swallowed() {
    let store = EntityStore::new();
    store.replace(snapshot(&[("sensor.temp", "20")]));
    let source = FixedStates(Err(Error::Network("down".into())));

    assert!(!store.bootstrap(&source).await);

    assert_eq!(store.get("sensor.temp").unwrap().state, "20");
}

#[tokio::test]
async fn feed_replaces_wholesale() {
    let store = EntityStore::new();
    store.replace(snapshot(&[("sensor.old", "1")]));
    let (tx, rx) = mpsc::unbounded_channel();
    let _feed = store.attach(Subscription::new(rx, || {}));

    tx.send(snapshot(&[("sensor.temp", "21"), ("sensor.hum", "60")])).unwrap();
    settle().await;

    assert_eq!(store.len(), 2);
    assert!(store.get("sensor.old").is_none());

    tx.send(snapshot(&[("sensor.temp", "22")])).unwrap();
    settle().await;
    assert_eq!(store.snapshot(), snapshot(&[("sensor.temp", "22")]));
}

#[tokio::test]
async fn dropping_feed_unsubscribes_once() {
    let store = EntityStore::new();
    let disposed = Arc::new(AtomicU32::new(0));
    let (tx, rx) = mpsc::unbounded_channel();
    let counter = Arc::clone(&disposed);
    let feed = store.attach(Subscription::new(rx, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    settle().await;

    drop(feed);
    settle().await;

    assert_eq!(disposed.load(Ordering::SeqCst), 1);
    assert!(tx.send(snapshot(&[("sensor.temp", "1")])).is_err());
    assert!(store.is_empty());
}

#[tokio::test]
async fn feed_finishes_when_stream_ends() {
    let store = EntityStore::new();
    let (tx, rx) = mpsc::unbounded_channel::<EntitySnapshot>();
    let feed = store.attach(Subscription::new(rx, || {}));

    drop(tx);
    settle().await;

    assert!(feed.is_finished());
}

#[tokio::test]
async fn watchers_see_replacements() {
    let store = EntityStore::new();
    let mut rx = store.watch();

    store.replace(snapshot(&[("sensor.temp", "21")]));

    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().len(), 1);
}
