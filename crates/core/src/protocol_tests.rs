// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::medium::FieldPath;
use serde_json::json;
use yare::parameterized;

#[test]
fn auth_message_shape() {
    let json: Value = serde_json::to_value(ClientMessage::auth("secret")).unwrap();
    assert_eq!(json, json!({ "type": "auth", "access_token": "secret" }));
}

#[test]
fn call_service_gets_id_on_send() {
    let cmd = Command::call_service("switch", "turn_on", json!({ "entity_id": "switch.fan" }));
    let json: Value = serde_json::to_value(cmd.into_message(7)).unwrap();
    assert_eq!(
        json,
        json!({
            "type": "call_service",
            "id": 7,
            "domain": "switch",
            "service": "turn_on",
            "service_data": { "entity_id": "switch.fan" }
        })
    );
}

#[parameterized(
    subscribe = { Command::subscribe_events("state_changed"), "subscribe_events" },
    unsubscribe = { Command::unsubscribe_events(3), "unsubscribe_events" },
    get_states = { Command::get_states(), "get_states" },
    ping = { Command::ping(), "ping" },
)]
fn command_message_type(cmd: Command, expected: &str) {
    assert_eq!(cmd.kind(), expected);
    let msg = cmd.into_message(42);
    assert_eq!(msg.id(), Some(42));
    let json: Value = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], json!(expected));
    assert_eq!(ClientMessage::from_json(&msg.to_json().unwrap()).unwrap(), msg);
}

#[test]
fn update_medium_command_payload() {
    let patch = MediumPatch::field(&FieldPath::top("plant_name"), json!("Gelato"));
    let cmd = Command::update_medium("GrowRoom", 1, Some("medium_2"), &patch);

    let Command::CallService {
        domain,
        service,
        service_data,
    } = cmd
    else {
        unreachable!("update_medium builds a service call");
    };
    assert_eq!(domain, SERVICE_DOMAIN);
    assert_eq!(service, UPDATE_MEDIUM_SERVICE);
    assert_eq!(
        service_data,
        json!({
            "room": "GrowRoom",
            "medium_index": 1,
            "medium_name": "medium_2",
            "fields": { "plant_name": "Gelato" }
        })
    );
}

#[test]
fn server_messages_parse() {
    let msg = ServerMessage::from_json(r#"{"type":"auth_required","ha_version":"2026.1.0"}"#).unwrap();
    assert!(matches!(msg, ServerMessage::AuthRequired { .. }));

    let msg = ServerMessage::from_json(r#"{"type":"auth_invalid","message":"Invalid access"}"#).unwrap();
    assert_eq!(
        msg,
        ServerMessage::AuthInvalid {
            message: "Invalid access".into()
        }
    );

    let msg = ServerMessage::from_json(
        r#"{"id":3,"type":"result","success":false,"error":{"code":"not_found","message":"Subscription not found."}}"#,
    )
    .unwrap();
    assert_eq!(msg, ServerMessage::failure(3, "not_found", "Subscription not found."));

    let msg = ServerMessage::from_json(r#"{"id":4,"type":"result","success":true,"result":null}"#).unwrap();
    assert_eq!(msg, ServerMessage::success(4, Value::Null));
}

#[test]
fn event_message_round_trip() {
    let msg = ServerMessage::event(5, MEDIUMS_UPDATE_EVENT, json!({ "Name": "GrowRoom", "plants": [] }));
    let parsed = ServerMessage::from_json(&msg.to_json().unwrap()).unwrap();
    assert_eq!(parsed, msg);
}

#[test]
fn parse_mediums_update() {
    let data = json!({
        "Name": "GrowRoom",
        "plants": [
            { "name": "medium_1", "plant_name": "A", "dates": { "growstartdate": "2026-01-01" } },
            { "name": "medium_2", "plant_name": "B" }
        ]
    });
    let event = PanelEvent::parse(MEDIUMS_UPDATE_EVENT, &data).unwrap().unwrap();

    assert_eq!(event.room(), "GrowRoom");
    let PanelEvent::MediumsUpdate { mediums, .. } = event else {
        unreachable!("parsed a list update");
    };
    assert_eq!(mediums.len(), 2);
    assert_eq!(mediums[1].name(), Some("medium_2"));
}

#[test]
fn parse_medium_update_uses_identity_field() {
    let data = json!({ "Name": "Tent", "medium_name": "medium_3", "plant_stage": "flower" });
    let event = PanelEvent::parse(MEDIUM_UPDATE_EVENT, &data).unwrap().unwrap();

    let PanelEvent::MediumUpdate { room, medium } = event else {
        unreachable!("parsed a single update");
    };
    assert_eq!(room, "Tent");
    assert_eq!(medium.name(), Some("medium_3"));
    assert_eq!(medium.get(&FieldPath::top("plant_stage")), Some(&json!("flower")));
    assert!(medium.get(&FieldPath::top("Name")).is_none());
    assert!(medium.get(&FieldPath::top("medium_name")).is_none());
}

#[parameterized(
    not_object = { MEDIUMS_UPDATE_EVENT, json!([1, 2]) },
    no_room = { MEDIUMS_UPDATE_EVENT, json!({ "plants": [] }) },
    no_list = { MEDIUMS_UPDATE_EVENT, json!({ "Name": "GrowRoom" }) },
    no_medium_name = { MEDIUM_UPDATE_EVENT, json!({ "Name": "GrowRoom" }) },
)]
fn parse_rejects_malformed(event_type: &str, data: Value) {
    assert!(PanelEvent::parse(event_type, &data).is_err());
}

#[test]
fn parse_ignores_unrelated_events() {
    assert!(PanelEvent::parse("call_service", &json!({})).unwrap().is_none());
}

#[test]
fn state_change_removed_entity() {
    let change = StateChange::parse(&json!({ "entity_id": "sensor.gone", "new_state": null })).unwrap();
    assert_eq!(change.entity_id, "sensor.gone");
    assert!(change.new_state.is_none());

    let change = StateChange::parse(&json!({
        "entity_id": "sensor.temp",
        "old_state": null,
        "new_state": { "entity_id": "sensor.temp", "state": "21.0", "attributes": {} }
    }))
    .unwrap();
    assert_eq!(change.new_state.unwrap().state, "21.0");
}
