// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport using tokio-tungstenite.
//!
//! After the auth handshake the socket is owned by a single actor task.
//! Callers talk to it over a channel; the actor assigns request ids, keeps
//! the pending-reply table and routes events to subscribers. The entity
//! stream is seeded with `get_states` and patched by `state_changed`
//! events, so every delivery is a complete map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use gp_core::protocol::{
    ClientMessage, Command, ErrorInfo, EventMessage, ServerMessage, StateChange,
    STATE_CHANGED_EVENT,
};
use gp_core::{snapshot_from_states, EntitySnapshot, EntityState};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::transport::{
    Connector, Lifecycle, ReadyState, Subscription, Transport, TransportError, TransportFuture,
    TransportResult,
};
use crate::credentials::Credentials;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const LIFECYCLE_CAPACITY: usize = 16;

/// Opens [`WsTransport`]s.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        WsConnector
    }
}

impl Connector for WsConnector {
    fn connect<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> TransportFuture<'a, Arc<dyn Transport>> {
        Box::pin(async move {
            let ws = tokio::time::timeout(HANDSHAKE_TIMEOUT, open(credentials))
                .await
                .map_err(|_| TransportError::ConnectionFailed("handshake timed out".to_string()))??;
            let transport: Arc<dyn Transport> = Arc::new(WsTransport::spawn(ws));
            Ok(transport)
        })
    }
}

/// Connects and runs the auth exchange.
async fn open(credentials: &Credentials) -> TransportResult<WsStream> {
    let (mut ws, _) = tokio_tungstenite::connect_async(credentials.ws_url.as_str())
        .await
        .map_err(connect_error)?;

    match next_server_message(&mut ws).await? {
        ServerMessage::AuthRequired { .. } => {}
        other => {
            return Err(TransportError::ConnectionFailed(format!(
                "expected auth_required, got {:?}",
                other
            )))
        }
    }

    let auth = ClientMessage::auth(credentials.token.clone())
        .to_json()
        .map_err(|e| TransportError::SerializationError(e.to_string()))?;
    ws.send(Message::Text(auth.into()))
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;

    match next_server_message(&mut ws).await? {
        ServerMessage::AuthOk { ha_version } => {
            info!(url = %credentials.ws_url, version = ?ha_version, "authenticated");
            Ok(ws)
        }
        ServerMessage::AuthInvalid { message } => Err(TransportError::Unauthorized(message)),
        other => Err(TransportError::ConnectionFailed(format!(
            "unexpected auth reply {:?}",
            other
        ))),
    }
}

async fn next_server_message(ws: &mut WsStream) -> TransportResult<ServerMessage> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return ServerMessage::from_json(&text)
                    .map_err(|e| TransportError::SerializationError(e.to_string()));
            }
            Some(Ok(Message::Close(_))) | None => return Err(TransportError::ConnectionClosed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
        }
    }
}

fn connect_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::Http(response) => TransportError::Http {
            status: response.status().as_u16(),
        },
        other => TransportError::ConnectionFailed(other.to_string()),
    }
}

/// Requests from transport handles to the socket actor.
enum Request {
    Command {
        command: Command,
        reply: Option<oneshot::Sender<TransportResult<Value>>>,
    },
    Subscribe {
        event_type: String,
        sink: mpsc::UnboundedSender<EventMessage>,
        reply: oneshot::Sender<TransportResult<u64>>,
    },
    Unsubscribe {
        subscription: u64,
    },
    SubscribeEntities {
        key: u64,
        sink: mpsc::UnboundedSender<EntitySnapshot>,
    },
    UnsubscribeEntities {
        key: u64,
    },
    Close,
}

/// A live, authenticated WebSocket connection.
pub struct WsTransport {
    requests: mpsc::UnboundedSender<Request>,
    ready: Arc<AtomicU8>,
    lifecycle: broadcast::Sender<Lifecycle>,
    next_key: AtomicU64,
}

impl WsTransport {
    fn spawn(ws: WsStream) -> Self {
        let (requests, rx) = mpsc::unbounded_channel();
        let ready = Arc::new(AtomicU8::new(ReadyState::Open.as_u8()));
        let (lifecycle, _) = broadcast::channel(LIFECYCLE_CAPACITY);

        let actor = Actor::new(Arc::clone(&ready), lifecycle.clone());
        tokio::spawn(actor.run(ws, rx));
        let _ = lifecycle.send(Lifecycle::Ready);

        WsTransport {
            requests,
            ready,
            lifecycle,
            next_key: AtomicU64::new(1),
        }
    }

    fn request(&self, request: Request) -> TransportResult<()> {
        if self.ready_state() != ReadyState::Open {
            return Err(TransportError::ConnectionClosed);
        }
        self.requests
            .send(request)
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

impl Transport for WsTransport {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready.load(Ordering::Acquire))
    }

    fn lifecycle(&self) -> broadcast::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }

    fn send_command(&self, command: Command) -> TransportFuture<'_, Value> {
        Box::pin(async move {
            let (tx, rx) = oneshot::channel();
            self.request(Request::Command {
                command,
                reply: Some(tx),
            })?;
            rx.await.map_err(|_| TransportError::ConnectionClosed)?
        })
    }

    fn fire_command(&self, command: Command) -> TransportResult<()> {
        self.request(Request::Command {
            command,
            reply: None,
        })
    }

    fn subscribe_events(&self, event_type: &str) -> TransportFuture<'_, Subscription<EventMessage>> {
        let event_type = event_type.to_string();
        Box::pin(async move {
            let (sink, rx) = mpsc::unbounded_channel();
            let (tx, reply) = oneshot::channel();
            self.request(Request::Subscribe {
                event_type,
                sink,
                reply: tx,
            })?;
            let subscription = reply
                .await
                .map_err(|_| TransportError::ConnectionClosed)??;

            let requests = self.requests.clone();
            Ok(Subscription::new(rx, move || {
                let _ = requests.send(Request::Unsubscribe { subscription });
            }))
        })
    }

    fn subscribe_entities(&self) -> TransportFuture<'_, Subscription<EntitySnapshot>> {
        Box::pin(async move {
            let key = self.next_key.fetch_add(1, Ordering::Relaxed);
            let (sink, rx) = mpsc::unbounded_channel();
            self.request(Request::SubscribeEntities { key, sink })?;

            let requests = self.requests.clone();
            Ok(Subscription::new(rx, move || {
                let _ = requests.send(Request::UnsubscribeEntities { key });
            }))
        })
    }

    fn close(&self) {
        let _ = self.ready.compare_exchange(
            ReadyState::Open.as_u8(),
            ReadyState::Closing.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        let _ = self.requests.send(Request::Close);
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        let _ = self.requests.send(Request::Close);
    }
}

/// Reply handling for an outstanding request id.
enum Pending {
    Reply(oneshot::Sender<TransportResult<Value>>),
    Subscribed(oneshot::Sender<TransportResult<u64>>),
    SeedEntities,
    Ignore,
}

/// Merged entity map and its subscribers.
#[derive(Default)]
struct EntityStream {
    /// Id of the `state_changed` subscription, once requested.
    subscription: Option<u64>,
    snapshot: Option<EntitySnapshot>,
    sinks: HashMap<u64, mpsc::UnboundedSender<EntitySnapshot>>,
}

impl EntityStream {
    fn publish(&mut self) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        self.sinks.retain(|_, sink| sink.send(snapshot.clone()).is_ok());
    }
}

enum Exit {
    Closed,
    Lost(Lifecycle),
}

struct Actor {
    next_id: u64,
    pending: HashMap<u64, Pending>,
    events: HashMap<u64, mpsc::UnboundedSender<EventMessage>>,
    entities: EntityStream,
    ready: Arc<AtomicU8>,
    lifecycle: broadcast::Sender<Lifecycle>,
}

impl Actor {
    fn new(ready: Arc<AtomicU8>, lifecycle: broadcast::Sender<Lifecycle>) -> Self {
        Actor {
            next_id: 1,
            pending: HashMap::new(),
            events: HashMap::new(),
            entities: EntityStream::default(),
            ready,
            lifecycle,
        }
    }

    async fn run(mut self, ws: WsStream, mut requests: mpsc::UnboundedReceiver<Request>) {
        let (mut sink, mut stream) = ws.split();

        let exit = loop {
            tokio::select! {
                request = requests.recv() => {
                    let request = match request {
                        Some(Request::Close) | None => break Exit::Closed,
                        Some(request) => request,
                    };
                    let outgoing = self.handle_request(request);
                    if let Err(e) = send_all(&mut sink, outgoing).await {
                        break Exit::Lost(Lifecycle::Error(e.to_string()));
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(&text),
                    Some(Ok(Message::Close(_))) | None => break Exit::Lost(Lifecycle::Disconnected),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Exit::Lost(Lifecycle::Error(e.to_string())),
                },
            }
        };

        self.ready
            .store(ReadyState::Closing.as_u8(), Ordering::Release);
        match exit {
            Exit::Closed => {
                let _ = sink.close().await;
                self.ready.store(ReadyState::Closed.as_u8(), Ordering::Release);
                debug!("websocket closed");
            }
            Exit::Lost(signal) => {
                self.ready.store(ReadyState::Closed.as_u8(), Ordering::Release);
                warn!(?signal, pending = self.pending.len(), "websocket lost");
                let _ = self.lifecycle.send(signal);
            }
        }
        // Dropping the pending table fails every waiter with ConnectionClosed.
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn command(&mut self, command: Command, pending: Pending) -> ClientMessage {
        let id = self.next_id();
        debug!(id, kind = command.kind(), "sending command");
        self.pending.insert(id, pending);
        command.into_message(id)
    }

    fn handle_request(&mut self, request: Request) -> Vec<ClientMessage> {
        match request {
            Request::Command { command, reply } => {
                let pending = reply.map_or(Pending::Ignore, Pending::Reply);
                vec![self.command(command, pending)]
            }
            Request::Subscribe {
                event_type,
                sink,
                reply,
            } => {
                let msg = self.command(
                    Command::subscribe_events(event_type),
                    Pending::Subscribed(reply),
                );
                if let Some(id) = msg.id() {
                    self.events.insert(id, sink);
                }
                vec![msg]
            }
            Request::Unsubscribe { subscription } => {
                if self.events.remove(&subscription).is_none() {
                    return Vec::new();
                }
                vec![self.command(Command::unsubscribe_events(subscription), Pending::Ignore)]
            }
            Request::SubscribeEntities { key, sink } => {
                if let Some(snapshot) = &self.entities.snapshot {
                    let _ = sink.send(snapshot.clone());
                }
                self.entities.sinks.insert(key, sink);
                if self.entities.subscription.is_some() {
                    return Vec::new();
                }
                let subscribe = self.command(
                    Command::subscribe_events(STATE_CHANGED_EVENT),
                    Pending::Ignore,
                );
                self.entities.subscription = subscribe.id();
                let seed = self.command(Command::get_states(), Pending::SeedEntities);
                vec![subscribe, seed]
            }
            Request::UnsubscribeEntities { key } => {
                self.entities.sinks.remove(&key);
                if !self.entities.sinks.is_empty() {
                    return Vec::new();
                }
                self.entities.snapshot = None;
                match self.entities.subscription.take() {
                    Some(id) => vec![self.command(Command::unsubscribe_events(id), Pending::Ignore)],
                    None => Vec::new(),
                }
            }
            Request::Close => Vec::new(),
        }
    }

    fn handle_text(&mut self, text: &str) {
        let msg = match ServerMessage::from_json(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "unparseable server message");
                return;
            }
        };
        match msg {
            ServerMessage::CommandResult {
                id,
                success,
                result,
                error,
            } => {
                let outcome = if success {
                    Ok(result)
                } else {
                    let ErrorInfo { code, message } = error.unwrap_or(ErrorInfo {
                        code: "unknown_error".to_string(),
                        message: "command failed".to_string(),
                    });
                    Err(TransportError::CommandFailed { code, message })
                };
                self.handle_result(id, outcome);
            }
            ServerMessage::Pong { id } => self.handle_result(id, Ok(Value::Null)),
            ServerMessage::Event { id, event } => self.handle_event(id, event),
            other => debug!(?other, "ignoring server message"),
        }
    }

    fn handle_result(&mut self, id: u64, outcome: TransportResult<Value>) {
        let Some(pending) = self.pending.remove(&id) else {
            debug!(id, "reply for unknown request");
            return;
        };
        match pending {
            Pending::Reply(tx) => {
                let _ = tx.send(outcome);
            }
            Pending::Subscribed(tx) => match outcome {
                Ok(_) => {
                    let _ = tx.send(Ok(id));
                }
                Err(e) => {
                    self.events.remove(&id);
                    let _ = tx.send(Err(e));
                }
            },
            Pending::SeedEntities => match outcome {
                Ok(result) => self.seed_entities(result),
                Err(e) => warn!(error = %e, "get_states failed"),
            },
            Pending::Ignore => {
                if let Err(e) = outcome {
                    debug!(id, error = %e, "unawaited command failed");
                }
            }
        }
    }

    fn seed_entities(&mut self, result: Value) {
        if self.entities.subscription.is_none() {
            return;
        }
        match serde_json::from_value::<Vec<EntityState>>(result) {
            Ok(states) => {
                debug!(count = states.len(), "entity stream seeded");
                self.entities.snapshot = Some(snapshot_from_states(states));
                self.entities.publish();
            }
            Err(e) => warn!(error = %e, "malformed get_states reply"),
        }
    }

    fn handle_event(&mut self, id: u64, event: EventMessage) {
        if self.entities.subscription == Some(id) {
            self.patch_entities(&event.data);
            return;
        }
        let Some(sink) = self.events.get(&id) else {
            debug!(id, event_type = %event.event_type, "event for unknown subscription");
            return;
        };
        if sink.send(event).is_err() {
            self.events.remove(&id);
        }
    }

    fn patch_entities(&mut self, data: &Value) {
        let change = match StateChange::parse(data) {
            Ok(change) => change,
            Err(e) => {
                warn!(error = %e, "malformed state_changed event");
                return;
            }
        };
        let Some(snapshot) = self.entities.snapshot.as_mut() else {
            return;
        };
        match change.new_state {
            Some(state) => {
                snapshot.insert(change.entity_id, state);
            }
            None => {
                snapshot.remove(&change.entity_id);
            }
        }
        self.entities.publish();
    }
}

async fn send_all(sink: &mut WsSink, messages: Vec<ClientMessage>) -> TransportResult<()> {
    for msg in messages {
        let json = msg
            .to_json()
            .map_err(|e| TransportError::SerializationError(e.to_string()))?;
        sink.send(Message::Text(json.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "websocket_tests.rs"]
mod tests;
