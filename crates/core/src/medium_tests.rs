// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use yare::parameterized;

fn sample() -> Medium {
    serde_json::from_value(json!({
        "name": "medium_1",
        "plant_name": "Northern Lights",
        "plant_stage": "veg",
        "dates": {
            "growstartdate": "2026-01-10",
            "breederbloomdays": 56
        }
    }))
    .unwrap()
}

#[parameterized(
    top = { "plant_name", FieldPath::Top("plant_name".into()) },
    date = { "dates.growstartdate", FieldPath::Date("growstartdate".into()) },
    dates_object = { "dates", FieldPath::Top("dates".into()) },
    trimmed = { "  plant_stage ", FieldPath::Top("plant_stage".into()) },
)]
fn field_path_parses(input: &str, expected: FieldPath) {
    assert_eq!(input.parse::<FieldPath>().unwrap(), expected);
}

#[parameterized(
    empty = { "" },
    empty_date = { "dates." },
    nested_too_deep = { "dates.a.b" },
    other_parent = { "plant.name" },
)]
fn field_path_rejects(input: &str) {
    assert!(matches!(
        input.parse::<FieldPath>(),
        Err(Error::InvalidFieldPath(_))
    ));
}

#[test]
fn field_path_display_round_trips() {
    let path = FieldPath::date(date_fields::BLOOMSWITCHDATE);
    assert_eq!(path.to_string(), "dates.bloomswitchdate");
    assert_eq!(path.to_string().parse::<FieldPath>().unwrap(), path);
}

#[test]
fn get_and_set_nested_dates() {
    let mut medium = sample();
    let path = FieldPath::date(date_fields::GROWSTARTDATE);
    assert_eq!(medium.get(&path), Some(&json!("2026-01-10")));

    medium.set(&path, json!("2026-02-01"));
    assert_eq!(medium.get(&path), Some(&json!("2026-02-01")));
    assert_eq!(
        medium.get(&FieldPath::date(date_fields::BREEDERBLOOMDAYS)),
        Some(&json!(56))
    );
}

#[test]
fn set_date_creates_dates_object() {
    let mut medium = Medium::new("medium_2");
    medium.set(&FieldPath::date(date_fields::HARVESTDATE), json!("2026-05-01"));
    assert_eq!(medium.dates().unwrap().len(), 1);
}

#[test]
fn apply_patch_merges_dates_shallowly() {
    let mut medium = sample();
    let mut patch = MediumPatch::new();
    patch.set(&FieldPath::top(fields::PLANT_NAME), json!("Blue Dream"));
    patch.set(&FieldPath::date(date_fields::BLOOMSWITCHDATE), json!("2026-03-01"));

    medium.apply_patch(&patch);

    assert_eq!(medium.get(&FieldPath::top(fields::PLANT_NAME)), Some(&json!("Blue Dream")));
    let dates = medium.dates().unwrap();
    assert_eq!(dates["growstartdate"], json!("2026-01-10"));
    assert_eq!(dates["breederbloomdays"], json!(56));
    assert_eq!(dates["bloomswitchdate"], json!("2026-03-01"));
}

#[test]
fn patch_merge_accumulates_by_key() {
    let mut patch = MediumPatch::field(&FieldPath::top("plant_name"), json!("A"));
    patch.merge(MediumPatch::field(&FieldPath::top("plant_strain"), json!("S")));
    patch.merge(MediumPatch::field(&FieldPath::top("plant_name"), json!("B")));
    patch.merge(MediumPatch::field(&FieldPath::date("growstartdate"), json!("d1")));
    patch.merge(MediumPatch::field(&FieldPath::date("harvestdate"), json!("d2")));

    assert_eq!(patch.get(&FieldPath::top("plant_name")), Some(&json!("B")));
    assert_eq!(patch.get(&FieldPath::top("plant_strain")), Some(&json!("S")));
    assert_eq!(patch.get(&FieldPath::date("growstartdate")), Some(&json!("d1")));
    assert_eq!(patch.get(&FieldPath::date("harvestdate")), Some(&json!("d2")));
    assert_eq!(patch.len(), 3);
}

#[test]
fn patch_fields_include_nested_dates() {
    let mut patch = MediumPatch::field(&FieldPath::top("plant_stage"), json!("flower"));
    patch.set(&FieldPath::date("bloomswitchdate"), json!("2026-03-01"));

    let fields = patch.fields();
    assert!(fields.contains(&FieldPath::top("plant_stage")));
    assert!(fields.contains(&FieldPath::top("dates")));
    assert!(fields.contains(&FieldPath::date("bloomswitchdate")));
}

#[test]
fn copy_field_from_removes_when_source_lacks_it() {
    let source = Medium::new("m");
    let mut target = sample();
    target.copy_field_from(&source, &FieldPath::top(fields::PLANT_NAME));
    assert!(target.get(&FieldPath::top(fields::PLANT_NAME)).is_none());

    target.copy_field_from(&sample(), &FieldPath::date(date_fields::GROWSTARTDATE));
    assert_eq!(
        target.get(&FieldPath::date(date_fields::GROWSTARTDATE)),
        Some(&json!("2026-01-10"))
    );
}

#[test]
fn unknown_fields_survive_serde() {
    let raw = json!({ "name": "m", "sensor_binding": { "moisture": "sensor.m1" } });
    let medium: Medium = serde_json::from_value(raw.clone()).unwrap();
    assert_eq!(serde_json::to_value(&medium).unwrap(), raw);
    assert_eq!(medium.name(), Some("m"));
}
