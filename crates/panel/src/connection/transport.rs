// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the push connection.
//!
//! Provides a trait-based transport layer that enables:
//! - Real WebSocket connections for production
//! - Mock transports for unit testing
//!
//! A [`Connector`] opens and authenticates; the returned [`Transport`] is
//! ready to use and reports later trouble through [`Lifecycle`] signals.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use gp_core::protocol::{Command, EventMessage};
use gp_core::EntitySnapshot;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use crate::credentials::Credentials;

/// Message fragments that mark a failure as an authorization problem.
const AUTH_MARKERS: [&str; 3] = ["unauthorized", "invalid token", "authentication failed"];

/// Error type for transport operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Server rejected the access token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Server answered a command with `success: false`.
    #[error("command failed ({code}): {message}")]
    CommandFailed { code: String, message: String },

    /// HTTP status during the upgrade or a REST call.
    #[error("http status {status}")]
    Http { status: u16 },
}

impl TransportError {
    /// Returns true for rejected credentials: HTTP 401/403, `auth_invalid`,
    /// or a message naming an authorization problem.
    pub fn is_authorization_failure(&self) -> bool {
        match self {
            TransportError::Unauthorized(_) => true,
            TransportError::Http { status } => *status == 401 || *status == 403,
            other => {
                let msg = other.to_string().to_lowercase();
                AUTH_MARKERS.iter().any(|marker| msg.contains(marker))
            }
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + Send + 'a>>;

/// Socket state as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ReadyState {
    pub fn as_u8(self) -> u8 {
        match self {
            ReadyState::Connecting => 0,
            ReadyState::Open => 1,
            ReadyState::Closing => 2,
            ReadyState::Closed => 3,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Connection lifecycle signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Ready,
    /// Closed by the peer.
    Disconnected,
    /// Socket or protocol failure.
    Error(String),
}

/// A live stream of values from the transport.
///
/// Dropping the subscription (or calling [`Subscription::unsubscribe`])
/// runs its disposer exactly once.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    disposer: Option<Box<dyn FnOnce() + Send>>,
}

impl<T> Subscription<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<T>, disposer: impl FnOnce() + Send + 'static) -> Self {
        Subscription {
            rx,
            disposer: Some(Box::new(disposer)),
        }
    }

    /// Next value; `None` once the transport side is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(mut self) {
        self.dispose();
    }

    fn dispose(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.disposer.is_some())
            .finish()
    }
}

/// An authenticated push connection.
pub trait Transport: Send + Sync {
    fn ready_state(&self) -> ReadyState;

    /// Receiver for lifecycle signals emitted after this call.
    fn lifecycle(&self) -> broadcast::Receiver<Lifecycle>;

    /// Sends a command and waits for its reply.
    fn send_command(&self, command: Command) -> TransportFuture<'_, Value>;

    /// Sends a command without waiting for a reply.
    fn fire_command(&self, command: Command) -> TransportResult<()>;

    /// Subscribes to a named event stream.
    fn subscribe_events(&self, event_type: &str) -> TransportFuture<'_, Subscription<EventMessage>>;

    /// Subscribes to the entity stream; each delivery is the full map.
    fn subscribe_entities(&self) -> TransportFuture<'_, Subscription<EntitySnapshot>>;

    /// Closes the connection without emitting lifecycle signals.
    fn close(&self);
}

/// Opens authenticated transports.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, credentials: &'a Credentials) -> TransportFuture<'a, Arc<dyn Transport>>;
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
