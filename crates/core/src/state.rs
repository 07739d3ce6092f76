// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection state machine.
//!
//! A session is in exactly one [`ConnectionState`] at a time and only moves
//! through [`ConnectionState::transition`]:
//!
//! ```text
//!   Disconnected ──Connect──► Connecting ──Ready──► Connected
//!        ▲                     │  │  │                 │
//!        │        ConfigInvalid│  │  │NetworkFailed    │TransportClosed
//!        │                     ▼  │  ▼                 ▼
//!        │             ConfigError│ NetworkError ◄── Disconnected
//!        │                        ▼
//!        └──Shutdown (any)   AuthError
//! ```
//!
//! Error states re-enter `Connecting` on `Connect` (scheduled retry) and any
//! state re-enters it on a manual `Reconnect`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lifecycle state of the push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Configuration is unusable; nothing retries until it changes.
    ConfigError,
    NetworkError,
    AuthError,
}

/// Events that drive the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// `connect()` or a scheduled reconnect fired.
    Connect,
    /// Manual `reconnect()`.
    Reconnect,
    ConfigInvalid,
    AuthRejected,
    NetworkFailed,
    /// Transport signalled `ready`.
    Ready,
    /// Transport stayed closed past the grace period.
    TransportClosed,
    /// Session teardown.
    Shutdown,
}

impl ConnectionState {
    /// Returns the string representation used in logs and status output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::ConfigError => "config_error",
            ConnectionState::NetworkError => "network_error",
            ConnectionState::AuthError => "auth_error",
        }
    }

    /// Returns true for the three failure states.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ConnectionState::ConfigError | ConnectionState::NetworkError | ConnectionState::AuthError
        )
    }

    /// Returns the state reached by applying `trigger`, if legal.
    pub fn next(&self, trigger: Trigger) -> Option<ConnectionState> {
        use ConnectionState::*;

        match (self, trigger) {
            (_, Trigger::Shutdown) => Some(Disconnected),
            (_, Trigger::Reconnect) => Some(Connecting),
            (Disconnected | ConfigError | NetworkError | AuthError, Trigger::Connect) => {
                Some(Connecting)
            }
            (Connecting, Trigger::ConfigInvalid) => Some(ConfigError),
            (Connecting, Trigger::AuthRejected) => Some(AuthError),
            (Connecting | Connected, Trigger::NetworkFailed) => Some(NetworkError),
            (Connecting | Connected, Trigger::Ready) => Some(Connected),
            (Connected, Trigger::TransportClosed) => Some(Disconnected),
            _ => None,
        }
    }

    /// Applies `trigger`, rejecting illegal transitions.
    pub fn transition(self, trigger: Trigger) -> Result<ConnectionState> {
        self.next(trigger).ok_or_else(|| Error::InvalidTransition {
            from: self.as_str().to_string(),
            trigger: trigger.as_str().to_string(),
            valid_triggers: self.valid_triggers(),
        })
    }

    /// Get valid triggers from this state as a formatted string.
    pub fn valid_triggers(&self) -> String {
        Trigger::ALL
            .iter()
            .filter(|t| self.next(**t).is_some())
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Trigger {
    /// Every trigger, in declaration order.
    pub const ALL: [Trigger; 8] = [
        Trigger::Connect,
        Trigger::Reconnect,
        Trigger::ConfigInvalid,
        Trigger::AuthRejected,
        Trigger::NetworkFailed,
        Trigger::Ready,
        Trigger::TransportClosed,
        Trigger::Shutdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Connect => "connect",
            Trigger::Reconnect => "reconnect",
            Trigger::ConfigInvalid => "config_invalid",
            Trigger::AuthRejected => "auth_rejected",
            Trigger::NetworkFailed => "network_failed",
            Trigger::Ready => "ready",
            Trigger::TransportClosed => "transport_closed",
            Trigger::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
