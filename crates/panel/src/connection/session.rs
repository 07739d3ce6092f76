// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The connection session.
//!
//! A [`ConnectionSession`] owns at most one transport at a time and drives
//! [`ConnectionState`] through its transitions: it validates credentials,
//! opens the transport, watches lifecycle signals, schedules reconnects
//! with backoff and discards the token after repeated rejection.
//!
//! State lives behind a `parking_lot` mutex that is never held across an
//! `.await`. Every change is published as a [`SessionStatus`] on a watch
//! channel.

use std::sync::{Arc, Weak};
use std::time::Duration;

use gp_core::protocol::{Command, EventMessage};
use gp_core::{Backoff, BackoffPolicy, ConnectionState, EntitySnapshot, Trigger};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::transport::{Connector, Lifecycle, ReadyState, Subscription, Transport, TransportError};
use crate::config::Config;
use crate::credentials::CredentialGate;
use crate::error::{Error, Result};
use crate::records::{CommandFuture, CommandSink};

/// Timing and retry limits for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub backoff: BackoffPolicy,
    /// Consecutive authorization failures before the token is discarded.
    pub max_unauthorized_attempts: u32,
    pub grace_period: Duration,
    /// Retries after the first `send_command` attempt.
    pub max_retries: u32,
    pub retry_step: Duration,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        SessionOptions {
            backoff: config.reconnect.backoff_policy(),
            max_unauthorized_attempts: config.reconnect.max_unauthorized_attempts,
            grace_period: config.reconnect.grace_period(),
            max_retries: config.commands.max_retries,
            retry_step: config.commands.retry_step(),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Published view of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatus {
    pub state: ConnectionState,
    /// User-facing explanation of the last failure.
    pub error: Option<String>,
    /// Reconnects scheduled since the last successful connection.
    pub attempt_count: u32,
    /// Delay of the pending reconnect, if one is scheduled.
    pub retry_in: Option<Duration>,
    /// The stored credentials are gone or unusable.
    pub redirect_to_config: bool,
    /// No further reconnect will happen without intervention.
    pub terminal: bool,
    /// Bumped on every successful connection.
    pub generation: u64,
}

impl SessionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Get a human-readable status string.
    pub fn status_string(&self) -> String {
        let mut out = match self.state {
            ConnectionState::Connecting if self.attempt_count > 0 => {
                format!("connecting (attempt {})", self.attempt_count)
            }
            state => state.as_str().to_string(),
        };
        if let Some(delay) = self.retry_in {
            out.push_str(&format!(", retrying in {}ms", delay.as_millis()));
        }
        if let Some(error) = &self.error {
            out.push_str(&format!(": {}", error));
        }
        out
    }
}

struct Core {
    state: ConnectionState,
    transport: Option<Arc<dyn Transport>>,
    generation: u64,
    backoff: Backoff,
    unauthorized_attempts: u32,
    error: Option<String>,
    redirect_to_config: bool,
    terminal: bool,
    online: bool,
    /// Identifies the current connect attempt; bumping it orphans one in flight.
    attempt: u64,
    reconnect_timer: Option<JoinHandle<()>>,
    /// Identifies the current reconnect timer.
    timer_seq: u64,
    retry_in: Option<Duration>,
    /// Lifecycle watcher for the live transport; also runs the grace period.
    watcher: Option<JoinHandle<()>>,
    start_task: Option<JoinHandle<()>>,
}

impl Core {
    fn new(policy: BackoffPolicy) -> Self {
        Core {
            state: ConnectionState::Disconnected,
            transport: None,
            generation: 0,
            backoff: Backoff::new(policy),
            unauthorized_attempts: 0,
            error: None,
            redirect_to_config: false,
            terminal: false,
            online: true,
            attempt: 0,
            reconnect_timer: None,
            timer_seq: 0,
            retry_in: None,
            watcher: None,
            start_task: None,
        }
    }

    fn transport_open(&self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|t| t.ready_state() == ReadyState::Open)
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        self.timer_seq += 1;
        self.retry_in = None;
    }

    fn drop_transport(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
    }

    fn apply(&mut self, trigger: Trigger) -> bool {
        match self.state.transition(trigger) {
            Ok(next) => {
                if next != self.state {
                    info!(from = %self.state, to = %next, %trigger, "connection state changed");
                }
                self.state = next;
                true
            }
            Err(e) => {
                warn!(error = %e, "ignored connection transition");
                false
            }
        }
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            error: self.error.clone(),
            attempt_count: self.backoff.attempt_count(),
            retry_in: self.retry_in,
            redirect_to_config: self.redirect_to_config,
            terminal: self.terminal,
            generation: self.generation,
        }
    }
}

struct Inner {
    options: SessionOptions,
    gate: Arc<CredentialGate>,
    connector: Arc<dyn Connector>,
    core: Mutex<Core>,
    status: watch::Sender<SessionStatus>,
}

/// Handle to a connection session. Clones share the same session.
#[derive(Clone)]
pub struct ConnectionSession {
    inner: Arc<Inner>,
}

impl ConnectionSession {
    pub fn new(
        options: SessionOptions,
        gate: Arc<CredentialGate>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let core = Core::new(options.backoff.clone());
        let (status, _) = watch::channel(core.status());
        ConnectionSession {
            inner: Arc::new(Inner {
                options,
                gate,
                connector,
                core: Mutex::new(core),
                status,
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| ConnectionSession { inner })
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.core.lock().state
    }

    /// True when credentials for a connection attempt are present.
    pub fn is_valid(&self) -> bool {
        self.inner.gate.is_valid()
    }

    fn publish(&self, core: &Core) {
        self.inner.status.send_replace(core.status());
    }

    /// Spawns the first connection attempt.
    pub fn start(&self) {
        let session = self.clone();
        let task = tokio::spawn(async move { session.connect().await });
        let mut core = self.inner.core.lock();
        if let Some(previous) = core.start_task.replace(task) {
            previous.abort();
        }
    }

    /// Cancels every timer, closes the transport and enters `Disconnected`.
    pub fn stop(&self) {
        let mut core = self.inner.core.lock();
        if let Some(task) = core.start_task.take() {
            task.abort();
        }
        core.cancel_reconnect();
        core.drop_transport();
        core.attempt += 1;
        core.error = None;
        core.apply(Trigger::Shutdown);
        self.publish(&core);
        info!("connection session stopped");
    }

    /// Connects unless a connection is up or already being established.
    pub async fn connect(&self) {
        let attempt = {
            let mut core = self.inner.core.lock();
            match core.state {
                ConnectionState::Connecting => return,
                ConnectionState::Connected if core.transport_open() => return,
                _ => {}
            }
            let trigger = if core.state == ConnectionState::Connected {
                Trigger::Reconnect
            } else {
                Trigger::Connect
            };
            core.cancel_reconnect();
            core.drop_transport();
            if !core.apply(trigger) {
                return;
            }
            core.attempt += 1;
            self.publish(&core);
            core.attempt
        };
        self.run_attempt(attempt).await;
    }

    /// Tears down the current transport and connects from scratch.
    pub async fn reconnect(&self) {
        let attempt = {
            let mut core = self.inner.core.lock();
            core.cancel_reconnect();
            core.drop_transport();
            core.backoff.reset();
            core.terminal = false;
            core.redirect_to_config = false;
            core.apply(Trigger::Reconnect);
            core.attempt += 1;
            self.publish(&core);
            core.attempt
        };
        info!("manual reconnect");
        self.run_attempt(attempt).await;
    }

    async fn run_attempt(&self, attempt: u64) {
        let credentials = {
            let mut core = self.inner.core.lock();
            if core.attempt != attempt {
                return;
            }
            let credentials = match self.inner.gate.validate() {
                Ok(credentials) => credentials,
                Err(e) => {
                    core.apply(Trigger::ConfigInvalid);
                    core.error = Some(e.to_string());
                    core.redirect_to_config = true;
                    self.publish(&core);
                    return;
                }
            };
            if !core.online {
                core.apply(Trigger::NetworkFailed);
                core.error = Some("offline: waiting for the network to come back".to_string());
                self.publish(&core);
                return;
            }
            credentials
        };

        debug!(url = %credentials.ws_url, "opening transport");
        let result = self.inner.connector.connect(&credentials).await;

        let mut core = self.inner.core.lock();
        if core.attempt != attempt {
            if let Ok(transport) = result {
                transport.close();
            }
            return;
        }
        match result {
            Ok(transport) => self.on_ready(&mut core, transport),
            Err(e) if e.is_authorization_failure() => self.on_auth_failure(&mut core, &e),
            Err(e) => self.on_network_failure(&mut core, &e),
        }
        self.publish(&core);
    }

    fn on_ready(&self, core: &mut Core, transport: Arc<dyn Transport>) {
        core.apply(Trigger::Ready);
        core.backoff.reset();
        core.unauthorized_attempts = 0;
        core.error = None;
        core.redirect_to_config = false;
        core.terminal = false;
        core.retry_in = None;
        core.generation += 1;
        core.watcher = Some(self.watch_transport(core.generation, &transport));
        core.transport = Some(transport);
        info!(generation = core.generation, "connected");
    }

    fn on_auth_failure(&self, core: &mut Core, err: &TransportError) {
        core.apply(Trigger::AuthRejected);
        core.unauthorized_attempts += 1;
        let max = self.inner.options.max_unauthorized_attempts;
        if core.unauthorized_attempts >= max {
            warn!(attempts = core.unauthorized_attempts, "giving up after repeated authorization failures");
            self.inner.gate.invalidate();
            core.cancel_reconnect();
            core.error = Some(format!(
                "authorization rejected {} times; the access token was removed, log in again",
                core.unauthorized_attempts
            ));
            core.redirect_to_config = true;
            core.terminal = true;
        } else {
            warn!(attempts = core.unauthorized_attempts, max, error = %err, "authorization rejected");
            core.error = Some(format!(
                "authorization rejected ({}/{}): {}, retrying",
                core.unauthorized_attempts, max, err
            ));
            self.schedule_reconnect(core);
        }
    }

    fn on_network_failure(&self, core: &mut Core, err: &TransportError) {
        core.apply(Trigger::NetworkFailed);
        core.error = Some(format!("connection failed: {}", err));
        warn!(error = %err, "connection attempt failed");
        self.schedule_reconnect(core);
    }

    /// Arms the reconnect timer, replacing any pending one.
    fn schedule_reconnect(&self, core: &mut Core) {
        core.cancel_reconnect();
        if !core.online {
            debug!("offline, reconnect not scheduled");
            return;
        }
        let Some(delay) = core.backoff.schedule() else {
            let max = core.backoff.policy().max_attempts;
            warn!(max, "reconnect attempts exhausted");
            core.terminal = true;
            core.error = Some(format!(
                "unable to reach the backend after {} attempts",
                max
            ));
            return;
        };

        let seq = core.timer_seq;
        let weak = Arc::downgrade(&self.inner);
        core.retry_in = Some(delay);
        core.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(session) = Self::from_weak(&weak) else {
                return;
            };
            {
                let mut core = session.inner.core.lock();
                if core.timer_seq != seq {
                    return;
                }
                core.reconnect_timer = None;
                core.retry_in = None;
            }
            session.connect().await;
        }));
        info!(
            attempt = core.backoff.attempt_count(),
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
    }

    /// Waits for a loss signal, then gives the transport a grace period.
    fn watch_transport(&self, generation: u64, transport: &Arc<dyn Transport>) -> JoinHandle<()> {
        let mut signals = transport.lifecycle();
        let transport = Arc::clone(transport);
        let weak = Arc::downgrade(&self.inner);
        let grace = self.inner.options.grace_period;

        tokio::spawn(async move {
            let error = if transport.ready_state() == ReadyState::Closed {
                None
            } else {
                loop {
                    match signals.recv().await {
                        Ok(Lifecycle::Ready) | Err(RecvError::Lagged(_)) => continue,
                        Ok(Lifecycle::Disconnected) | Err(RecvError::Closed) => break None,
                        Ok(Lifecycle::Error(msg)) => break Some(msg),
                    }
                }
            };
            debug!(generation, ?error, "transport lost, grace period started");
            tokio::time::sleep(grace).await;
            if let Some(session) = Self::from_weak(&weak) {
                session.after_grace(generation, error);
            }
        })
    }

    fn after_grace(&self, generation: u64, error: Option<String>) {
        let mut core = self.inner.core.lock();
        if core.generation != generation || core.state != ConnectionState::Connected {
            return;
        }
        core.watcher = None;
        if core.transport_open() {
            debug!(generation, "transport recovered within grace period");
            if let Some(transport) = core.transport.clone() {
                core.watcher = Some(self.watch_transport(generation, &transport));
            }
            return;
        }

        core.drop_transport();
        let trigger = match &error {
            Some(msg) => {
                core.error = Some(format!("connection lost: {}", msg));
                Trigger::NetworkFailed
            }
            None => {
                core.error = Some("connection lost".to_string());
                Trigger::TransportClosed
            }
        };
        core.apply(trigger);
        self.schedule_reconnect(&mut core);
        self.publish(&core);
    }

    /// Records connectivity; coming back online connects immediately.
    pub async fn set_online(&self, online: bool) {
        let should_connect = {
            let mut core = self.inner.core.lock();
            let was_online = core.online;
            core.online = online;
            if !online {
                core.cancel_reconnect();
                self.publish(&core);
                info!("offline");
                false
            } else if !was_online && core.transport.is_none() {
                core.cancel_reconnect();
                core.backoff.reset();
                core.terminal = false;
                info!("back online");
                true
            } else {
                false
            }
        };
        if should_connect {
            self.connect().await;
        }
    }

    /// Visibility hint; becoming visible revives a dead connection.
    pub async fn set_visible(&self, visible: bool) {
        if !visible {
            return;
        }
        let should_reconnect = {
            let core = self.inner.core.lock();
            match &core.transport {
                Some(transport) => transport.ready_state() == ReadyState::Closed,
                None => {
                    matches!(
                        core.state,
                        ConnectionState::Disconnected | ConnectionState::NetworkError
                    ) && core.reconnect_timer.is_none()
                        && !core.terminal
                }
            }
        };
        if should_reconnect {
            self.reconnect().await;
        }
    }

    fn usable_transport(&self) -> Option<Arc<dyn Transport>> {
        self.inner
            .core
            .lock()
            .transport
            .as_ref()
            .filter(|t| t.ready_state() != ReadyState::Closed)
            .cloned()
    }

    fn live_transport(&self) -> Result<Arc<dyn Transport>> {
        self.usable_transport()
            .ok_or_else(|| Error::Network("not connected".to_string()))
    }

    /// Sends a command and awaits the reply, retrying on failure.
    ///
    /// Makes `max_retries + 1` attempts, waiting `retry_step * n` after
    /// failed attempt `n`. Never changes the connection state.
    pub async fn send_command(&self, command: Command) -> Result<Value> {
        let attempts = self.inner.options.max_retries + 1;
        let mut last_error = TransportError::ConnectionClosed;

        for attempt in 1..=attempts {
            let result = match self.usable_transport() {
                Some(transport) => transport.send_command(command.clone()).await,
                None => Err(TransportError::ConnectionClosed),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) => {
                    debug!(attempt, kind = command.kind(), error = %e, "command attempt failed");
                    last_error = e;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.inner.options.retry_step * attempt).await;
            }
        }

        warn!(attempts, kind = command.kind(), error = %last_error, "command failed");
        Err(Error::Command {
            attempts,
            source: last_error,
        })
    }

    /// Sends a command without waiting for the reply.
    pub fn fire_command(&self, command: Command) -> Result<()> {
        self.live_transport()?.fire_command(command)?;
        Ok(())
    }

    pub async fn subscribe_events(&self, event_type: &str) -> Result<Subscription<EventMessage>> {
        let transport = self.live_transport()?;
        Ok(transport.subscribe_events(event_type).await?)
    }

    pub async fn subscribe_entities(&self) -> Result<Subscription<EntitySnapshot>> {
        let transport = self.live_transport()?;
        Ok(transport.subscribe_entities().await?)
    }
}

impl CommandSink for ConnectionSession {
    fn send_command(&self, command: Command) -> CommandFuture<'_> {
        Box::pin(ConnectionSession::send_command(self, command))
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
