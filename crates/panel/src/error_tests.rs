// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    config = { Error::Config("missing access token".into()), "missing access token" },
    auth = { Error::Auth { attempts: 2, max: 3 }, "(2/3)" },
    network = { Error::Network("connection refused".into()), "connection refused" },
    medium = { Error::MediumNotFound(4), "index 4" },
)]
fn error_display_contains(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected));
}

#[test]
fn command_error_wraps_transport_error() {
    let err = Error::Command {
        attempts: 3,
        source: TransportError::ConnectionClosed,
    };
    let msg = err.to_string();
    assert!(msg.contains("3 attempt"));
    assert!(msg.contains("connection closed"));
    assert!(err.is_retryable());
}

#[test]
fn config_and_auth_are_not_retryable() {
    assert!(!Error::Config("x".into()).is_retryable());
    assert!(!Error::Auth { attempts: 3, max: 3 }.is_retryable());
}

#[test]
fn error_from_core() {
    let err: Error = gp_core::Error::RecordNotFound(1).into();
    assert!(matches!(err, Error::Core(_)));
}
