// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable connector and transport for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use gp_core::protocol::{Command, EventMessage};
use gp_core::EntitySnapshot;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use super::transport::{
    Connector, Lifecycle, ReadyState, Subscription, Transport, TransportError, TransportFuture,
    TransportResult,
};
use crate::credentials::Credentials;

/// In-memory transport that records commands and lets tests push data.
pub struct MockTransport {
    ready: AtomicU8,
    lifecycle: broadcast::Sender<Lifecycle>,
    sent: Mutex<Vec<Command>>,
    fired: Mutex<Vec<Command>>,
    replies: Mutex<VecDeque<TransportResult<Value>>>,
    events: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<EventMessage>>>>,
    entities: Mutex<Vec<mpsc::UnboundedSender<EntitySnapshot>>>,
    unsubscribed: Arc<AtomicU32>,
    closed: AtomicU32,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        let (lifecycle, _) = broadcast::channel(16);
        Arc::new(MockTransport {
            ready: AtomicU8::new(ReadyState::Open.as_u8()),
            lifecycle,
            sent: Mutex::new(Vec::new()),
            fired: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
            events: Mutex::new(HashMap::new()),
            entities: Mutex::new(Vec::new()),
            unsubscribed: Arc::new(AtomicU32::new(0)),
            closed: AtomicU32::new(0),
        })
    }

    /// Queues the reply for the next `send_command`; default is `Ok(null)`.
    pub fn reply_with(&self, reply: TransportResult<Value>) {
        self.replies.lock().push_back(reply);
    }

    pub fn sent(&self) -> Vec<Command> {
        self.sent.lock().clone()
    }

    pub fn fired(&self) -> Vec<Command> {
        self.fired.lock().clone()
    }

    pub fn set_ready_state(&self, state: ReadyState) {
        self.ready.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Marks the socket closed and emits the signal.
    pub fn emit(&self, signal: Lifecycle) {
        if signal != Lifecycle::Ready {
            self.set_ready_state(ReadyState::Closed);
        }
        let _ = self.lifecycle.send(signal);
    }

    /// Delivers an event to every subscriber of `event_type`.
    pub fn push_event(&self, event_type: &str, data: Value) {
        let event = EventMessage {
            event_type: event_type.to_string(),
            data,
            time_fired: None,
        };
        if let Some(sinks) = self.events.lock().get_mut(event_type) {
            sinks.retain(|sink| sink.send(event.clone()).is_ok());
        }
    }

    pub fn push_entities(&self, snapshot: EntitySnapshot) {
        self.entities
            .lock()
            .retain(|sink| sink.send(snapshot.clone()).is_ok());
    }

    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .get(event_type)
            .map_or(0, |sinks| sinks.iter().filter(|s| !s.is_closed()).count())
    }

    pub fn unsubscribe_count(&self) -> u32 {
        self.unsubscribed.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }

    fn counted<T: Send + 'static>(&self, rx: mpsc::UnboundedReceiver<T>) -> Subscription<T> {
        let unsubscribed = Arc::clone(&self.unsubscribed);
        Subscription::new(rx, move || {
            unsubscribed.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn check_open(&self) -> TransportResult<()> {
        if self.ready_state() == ReadyState::Closed {
            return Err(TransportError::ConnectionClosed);
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready.load(Ordering::SeqCst))
    }

    fn lifecycle(&self) -> broadcast::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }

    fn send_command(&self, command: Command) -> TransportFuture<'_, Value> {
        Box::pin(async move {
            self.check_open()?;
            self.sent.lock().push(command);
            self.replies.lock().pop_front().unwrap_or(Ok(Value::Null))
        })
    }

    fn fire_command(&self, command: Command) -> TransportResult<()> {
        self.check_open()?;
        self.fired.lock().push(command);
        Ok(())
    }

    fn subscribe_events(&self, event_type: &str) -> TransportFuture<'_, Subscription<EventMessage>> {
        let event_type = event_type.to_string();
        Box::pin(async move {
            self.check_open()?;
            let (tx, rx) = mpsc::unbounded_channel();
            self.events.lock().entry(event_type).or_default().push(tx);
            Ok(self.counted(rx))
        })
    }

    fn subscribe_entities(&self) -> TransportFuture<'_, Subscription<EntitySnapshot>> {
        Box::pin(async move {
            self.check_open()?;
            let (tx, rx) = mpsc::unbounded_channel();
            self.entities.lock().push(tx);
            Ok(self.counted(rx))
        })
    }

    fn close(&self) {
        self.set_ready_state(ReadyState::Closed);
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// What the next `connect` call yields.
pub enum Outcome {
    Connect(Arc<MockTransport>),
    Fail(TransportError),
}

/// Connector that plays back scripted outcomes.
///
/// Once the script runs out every attempt fails with `ConnectionFailed`.
pub struct MockConnector {
    script: Mutex<VecDeque<Outcome>>,
    attempts: AtomicU32,
    tokens: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new(script: Vec<Outcome>) -> Arc<Self> {
        Arc::new(MockConnector {
            script: Mutex::new(script.into()),
            attempts: AtomicU32::new(0),
            tokens: Mutex::new(Vec::new()),
        })
    }

    /// Connector whose first attempt succeeds with `transport`.
    pub fn connecting(transport: &Arc<MockTransport>) -> Arc<Self> {
        Self::new(vec![Outcome::Connect(Arc::clone(transport))])
    }

    pub fn push(&self, outcome: Outcome) {
        self.script.lock().push_back(outcome);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }
}

impl Connector for MockConnector {
    fn connect<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> TransportFuture<'a, Arc<dyn Transport>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.tokens.lock().push(credentials.token.clone());
            match self.script.lock().pop_front() {
                Some(Outcome::Connect(transport)) => {
                    transport.set_ready_state(ReadyState::Open);
                    let transport: Arc<dyn Transport> = transport;
                    Ok(transport)
                }
                Some(Outcome::Fail(err)) => Err(err),
                None => Err(TransportError::ConnectionFailed(
                    "connection refused".to_string(),
                )),
            }
        })
    }
}
