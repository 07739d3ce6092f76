// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages for the backend's push API.
//!
//! The exchange is:
//! - Server greets with `auth_required`, client answers `auth`, server
//!   replies `auth_ok` or `auth_invalid`
//! - Client commands carry an incrementing `id`; the server answers each
//!   with a `result` carrying the same id
//! - Event subscriptions deliver `event` messages tagged with the id of the
//!   `subscribe_events` command that created them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::EntityState;
use crate::error::{Error, Result};
use crate::medium::{Medium, MediumPatch, NAME};

/// Full medium list for a room.
pub const MEDIUMS_UPDATE_EVENT: &str = "MediumPlantsUpdate";
/// One medium changed.
pub const MEDIUM_UPDATE_EVENT: &str = "MediumPlantUpdate";
/// Backend entity state changes.
pub const STATE_CHANGED_EVENT: &str = "state_changed";

/// Service domain for medium commands.
pub const SERVICE_DOMAIN: &str = "opengrowbox";
pub const UPDATE_MEDIUM_SERVICE: &str = "update_medium";

const ROOM_FIELD: &str = "Name";
const MEDIUMS_FIELD: &str = "plants";
const MEDIUM_NAME_FIELD: &str = "medium_name";

/// Commands the client can issue (request id is added on send).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SubscribeEvents {
        event_type: String,
    },
    UnsubscribeEvents {
        subscription: u64,
    },
    GetStates,
    CallService {
        domain: String,
        service: String,
        #[serde(default)]
        service_data: Value,
    },
    Ping,
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Answer to `auth_required`.
    Auth { access_token: String },
    SubscribeEvents {
        id: u64,
        event_type: String,
    },
    UnsubscribeEvents {
        id: u64,
        subscription: u64,
    },
    GetStates {
        id: u64,
    },
    CallService {
        id: u64,
        domain: String,
        service: String,
        service_data: Value,
    },
    Ping {
        id: u64,
    },
}

/// Error details in a failed `result`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// Body of an `event` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventMessage {
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_fired: Option<DateTime<Utc>>,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: String,
    },
    /// Reply to a command.
    #[serde(rename = "result")]
    CommandResult {
        id: u64,
        success: bool,
        #[serde(default)]
        result: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorInfo>,
    },
    /// Delivery for the subscription created by command `id`.
    Event { id: u64, event: EventMessage },
    Pong { id: u64 },
}

impl Command {
    pub fn subscribe_events(event_type: impl Into<String>) -> Self {
        Command::SubscribeEvents {
            event_type: event_type.into(),
        }
    }

    pub fn unsubscribe_events(subscription: u64) -> Self {
        Command::UnsubscribeEvents { subscription }
    }

    pub fn get_states() -> Self {
        Command::GetStates
    }

    pub fn call_service(
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: Value,
    ) -> Self {
        Command::CallService {
            domain: domain.into(),
            service: service.into(),
            service_data,
        }
    }

    pub fn ping() -> Self {
        Command::Ping
    }

    /// Outbound write of a medium patch.
    pub fn update_medium(room: &str, index: usize, name: Option<&str>, patch: &MediumPatch) -> Self {
        let mut data = Map::new();
        data.insert("room".to_string(), Value::String(room.to_string()));
        data.insert("medium_index".to_string(), Value::from(index));
        if let Some(name) = name {
            data.insert(MEDIUM_NAME_FIELD.to_string(), Value::String(name.to_string()));
        }
        data.insert("fields".to_string(), patch.clone().into_value());
        Command::call_service(SERVICE_DOMAIN, UPDATE_MEDIUM_SERVICE, Value::Object(data))
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::SubscribeEvents { .. } => "subscribe_events",
            Command::UnsubscribeEvents { .. } => "unsubscribe_events",
            Command::GetStates => "get_states",
            Command::CallService { .. } => "call_service",
            Command::Ping => "ping",
        }
    }

    /// Attaches a request id.
    pub fn into_message(self, id: u64) -> ClientMessage {
        match self {
            Command::SubscribeEvents { event_type } => {
                ClientMessage::SubscribeEvents { id, event_type }
            }
            Command::UnsubscribeEvents { subscription } => {
                ClientMessage::UnsubscribeEvents { id, subscription }
            }
            Command::GetStates => ClientMessage::GetStates { id },
            Command::CallService {
                domain,
                service,
                service_data,
            } => ClientMessage::CallService {
                id,
                domain,
                service,
                service_data,
            },
            Command::Ping => ClientMessage::Ping { id },
        }
    }
}

impl ClientMessage {
    pub fn auth(access_token: impl Into<String>) -> Self {
        ClientMessage::Auth {
            access_token: access_token.into(),
        }
    }

    /// Request id, if the message carries one.
    pub fn id(&self) -> Option<u64> {
        match self {
            ClientMessage::Auth { .. } => None,
            ClientMessage::SubscribeEvents { id, .. }
            | ClientMessage::UnsubscribeEvents { id, .. }
            | ClientMessage::GetStates { id }
            | ClientMessage::CallService { id, .. }
            | ClientMessage::Ping { id } => Some(*id),
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    pub fn success(id: u64, result: Value) -> Self {
        ServerMessage::CommandResult {
            id,
            success: true,
            result,
            error: None,
        }
    }

    pub fn failure(id: u64, code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::CommandResult {
            id,
            success: false,
            result: Value::Null,
            error: Some(ErrorInfo {
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    pub fn event(id: u64, event_type: impl Into<String>, data: Value) -> Self {
        ServerMessage::Event {
            id,
            event: EventMessage {
                event_type: event_type.into(),
                data,
                time_fired: None,
            },
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Domain events pushed for the panel's rooms.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    /// Authoritative medium list for a room.
    MediumsUpdate { room: String, mediums: Vec<Medium> },
    /// One medium, identified by name.
    MediumUpdate { room: String, medium: Medium },
}

impl PanelEvent {
    /// Parses an event payload; returns `None` for unrelated event types.
    pub fn parse(event_type: &str, data: &Value) -> Result<Option<PanelEvent>> {
        match event_type {
            MEDIUMS_UPDATE_EVENT => {
                let object = payload_object(data)?;
                let room = room_of(object)?;
                let mediums = match object.get(MEDIUMS_FIELD) {
                    Some(list) => serde_json::from_value(list.clone())?,
                    None => {
                        return Err(Error::InvalidPayload(format!(
                            "{} without '{}'",
                            MEDIUMS_UPDATE_EVENT, MEDIUMS_FIELD
                        )))
                    }
                };
                Ok(Some(PanelEvent::MediumsUpdate { room, mediums }))
            }
            MEDIUM_UPDATE_EVENT => {
                let object = payload_object(data)?;
                let room = room_of(object)?;
                let name = object
                    .get(MEDIUM_NAME_FIELD)
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        Error::InvalidPayload(format!(
                            "{} without '{}'",
                            MEDIUM_UPDATE_EVENT, MEDIUM_NAME_FIELD
                        ))
                    })?;
                let mut fields: Map<String, Value> = object
                    .iter()
                    .filter(|(k, _)| k.as_str() != ROOM_FIELD && k.as_str() != MEDIUM_NAME_FIELD)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                fields.insert(NAME.to_string(), Value::String(name.to_string()));
                Ok(Some(PanelEvent::MediumUpdate {
                    room,
                    medium: Medium::from_map(fields),
                }))
            }
            _ => Ok(None),
        }
    }

    pub fn room(&self) -> &str {
        match self {
            PanelEvent::MediumsUpdate { room, .. } | PanelEvent::MediumUpdate { room, .. } => room,
        }
    }
}

/// Payload of a `state_changed` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateChange {
    pub entity_id: String,
    /// `None` when the entity was removed.
    #[serde(default)]
    pub new_state: Option<EntityState>,
}

impl StateChange {
    pub fn parse(data: &Value) -> Result<StateChange> {
        Ok(serde_json::from_value(data.clone())?)
    }
}

fn payload_object(data: &Value) -> Result<&Map<String, Value>> {
    data.as_object()
        .ok_or_else(|| Error::InvalidPayload("event data is not an object".to_string()))
}

fn room_of(object: &Map<String, Value>) -> Result<String> {
    object
        .get(ROOM_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidPayload(format!("missing room field '{}'", ROOM_FIELD)))
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
