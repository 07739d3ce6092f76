// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::*;
use crate::connection::test_helpers::{MockConnector, MockTransport, Outcome};
use crate::connection::{Lifecycle, TransportError};
use crate::credentials::MemoryCredentialStore;
use crate::error::Error;
use crate::rest::StatesFuture;
use gp_core::protocol::Command;
use gp_core::{snapshot_from_states, ConnectionState, EntityState, FieldPath, MediumPatch};
use serde_json::json;

const ROOM: &str = "GrowRoom";

#[derive(Default)]
struct FixedStates {
    fail: bool,
    fetches: AtomicU32,
}

impl FixedStates {
    fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl StatesSource for FixedStates {
    fn fetch_states(&self) -> StatesFuture<'_> {
        let fail = self.fail;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if fail {
                return Err(Error::Transport(TransportError::Http { status: 500 }));
            }
            Ok(vec![EntityState::new("sensor.temp", "24.5")])
        })
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

async fn advance(delay: Duration) {
    tokio::time::sleep(delay).await;
    settle().await;
}

fn panel_with(connector: &Arc<MockConnector>, fail_bootstrap: bool) -> Panel {
    let states = FixedStates {
        fail: fail_bootstrap,
        ..FixedStates::default()
    };
    panel_with_states(connector, Arc::new(states))
}

fn panel_with_states(connector: &Arc<MockConnector>, states: Arc<FixedStates>) -> Panel {
    let config = Config {
        room: Some(ROOM.to_string()),
        ..Config::default()
    };
    let store = Arc::new(MemoryCredentialStore::with_token("access_token", "tok"));
    let gate = Arc::new(CredentialGate::new(&config, store));
    Panel::new(&config, gate, connector.clone()).with_states_source(states)
}

fn assert_subscribed(transport: &MockTransport) {
    assert_eq!(transport.subscriber_count(MEDIUMS_UPDATE_EVENT), 1);
    assert_eq!(transport.subscriber_count(MEDIUM_UPDATE_EVENT), 1);
}

#[tokio::test(start_paused = true)]
async fn start_bootstraps_and_subscribes() {
    let transport = MockTransport::new();
    let connector = MockConnector::connecting(&transport);
    let panel = panel_with(&connector, false);

    panel.start();
    settle().await;

    assert_eq!(panel.status().state, ConnectionState::Connected);
    assert_eq!(panel.entities().get("sensor.temp").unwrap().state, "24.5");
    assert_subscribed(&transport);
    assert!(panel.records().view().loading);
}

#[tokio::test(start_paused = true)]
async fn pushes_reach_the_stores() {
    let transport = MockTransport::new();
    let connector = MockConnector::connecting(&transport);
    let panel = panel_with(&connector, false);
    panel.start();
    settle().await;

    transport.push_event(
        MEDIUMS_UPDATE_EVENT,
        json!({"Name": ROOM, "plants": [{"name": "medium_1", "plant_name": "Gelato"}]}),
    );
    transport.push_entities(snapshot_from_states(vec![
        EntityState::new("sensor.hum", "61"),
        EntityState::new("switch.light", "on"),
    ]));
    settle().await;

    let view = panel.records().view();
    assert!(!view.loading);
    assert_eq!(view.records.len(), 1);
    assert_eq!(panel.entities().len(), 2);
    assert!(panel.entities().get("sensor.temp").is_none());
}

#[tokio::test(start_paused = true)]
async fn bootstrap_failure_does_not_block_subscriptions() {
    let transport = MockTransport::new();
    let connector = MockConnector::connecting(&transport);
    let panel = panel_with(&connector, true);

    panel.start();
    settle().await;

    assert!(panel.entities().is_empty());
    assert_subscribed(&transport);
}

#[tokio::test(start_paused = true)]
async fn bootstrap_waits_for_connected() {
    let transport = MockTransport::new();
    let connector = MockConnector::new(vec![
        Outcome::Fail(TransportError::ConnectionFailed("connection refused".into())),
        Outcome::Connect(transport.clone()),
    ]);
    let states = Arc::new(FixedStates::default());
    let panel = panel_with_states(&connector, states.clone());

    panel.start();
    settle().await;
    assert!(!panel.status().is_connected());
    assert_eq!(states.fetches(), 0);
    assert!(panel.entities().is_empty());

    advance(ms(1_000)).await;
    assert_eq!(panel.status().state, ConnectionState::Connected);
    assert_eq!(states.fetches(), 1);
    assert_eq!(panel.entities().get("sensor.temp").unwrap().state, "24.5");
    assert_subscribed(&transport);
}

#[tokio::test(start_paused = true)]
async fn debounced_edit_goes_out_over_the_session() {
    let transport = MockTransport::new();
    let connector = MockConnector::connecting(&transport);
    let panel = panel_with(&connector, false);
    panel.start();
    settle().await;
    transport.push_event(
        MEDIUMS_UPDATE_EVENT,
        json!({"Name": ROOM, "plants": [{"name": "medium_1", "plant_name": "Gelato"}]}),
    );
    settle().await;

    let patch = MediumPatch::field(&FieldPath::top("plant_name"), json!("Runtz"));
    panel.records().debounced_update(0, patch.clone());
    advance(ms(600)).await;

    let expected = Command::update_medium(ROOM, 0, Some("medium_1"), &patch);
    assert_eq!(transport.sent(), vec![expected]);
}

#[tokio::test(start_paused = true)]
async fn fresh_connection_gets_fresh_subscriptions() {
    let first = MockTransport::new();
    let second = MockTransport::new();
    let connector = MockConnector::new(vec![
        Outcome::Connect(first.clone()),
        Outcome::Connect(second.clone()),
    ]);
    let panel = panel_with(&connector, false);
    panel.start();
    settle().await;
    assert_subscribed(&first);

    first.emit(Lifecycle::Disconnected);
    advance(ms(1_000)).await;
    assert_eq!(panel.status().state, ConnectionState::Disconnected);
    assert_eq!(first.unsubscribe_count(), 3);

    advance(ms(1_000)).await;
    let status = panel.status();
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.generation, 2);
    assert_subscribed(&second);

    second.push_event(
        MEDIUM_UPDATE_EVENT,
        json!({"Name": ROOM, "medium_name": "medium_7", "plant_name": "Late"}),
    );
    settle().await;
    assert_eq!(panel.records().records().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_tears_everything_down() {
    let transport = MockTransport::new();
    let connector = MockConnector::connecting(&transport);
    let panel = panel_with(&connector, false);
    panel.start();
    settle().await;
    let patch = MediumPatch::field(&FieldPath::top("plant_name"), json!("Runtz"));
    panel.records().debounced_update(0, patch);

    panel.shutdown();
    settle().await;

    assert_eq!(panel.status().state, ConnectionState::Disconnected);
    assert_eq!(transport.close_count(), 1);
    assert_eq!(transport.unsubscribe_count(), 3);
    assert_eq!(panel.records().pending_count(), 0);

    advance(ms(60_000)).await;
    assert_eq!(connector.attempts(), 1);
    assert!(transport.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn start_after_shutdown_is_ignored() {
    let transport = MockTransport::new();
    let connector = MockConnector::connecting(&transport);
    let panel = panel_with(&connector, false);

    panel.shutdown();
    panel.start();
    settle().await;

    assert_eq!(connector.attempts(), 0);
}
