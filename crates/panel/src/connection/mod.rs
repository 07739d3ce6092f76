// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Push connection to the backend.
//!
//! This module provides:
//! - [`Transport`] / [`Connector`]: the transport abstraction
//! - [`WsConnector`]: the WebSocket implementation
//! - [`ConnectionSession`]: the state machine driving one connection

mod session;
mod transport;
mod websocket;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use session::{ConnectionSession, SessionOptions, SessionStatus};
pub use transport::{
    Connector, Lifecycle, ReadyState, Subscription, Transport, TransportError, TransportFuture,
    TransportResult,
};
pub use websocket::{WsConnector, WsTransport};
