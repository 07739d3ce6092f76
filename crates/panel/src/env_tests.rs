// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

#[test]
fn test_vars_constants() {
    assert_eq!(vars::GROWPANEL_CONFIG, "GROWPANEL_CONFIG");
    assert_eq!(vars::GROWPANEL_STATE_DIR, "GROWPANEL_STATE_DIR");
    assert_eq!(vars::GROWPANEL_DEV_URL, "GROWPANEL_DEV_URL");
    assert_eq!(vars::GROWPANEL_DEV_TOKEN, "GROWPANEL_DEV_TOKEN");
    assert_eq!(vars::XDG_STATE_HOME, "XDG_STATE_HOME");
}

#[test]
fn test_state_dir_set_and_blank() {
    std::env::set_var("GROWPANEL_STATE_DIR", "/tmp/growpanel-state");
    assert_eq!(state_dir(), Some(PathBuf::from("/tmp/growpanel-state")));

    std::env::set_var("GROWPANEL_STATE_DIR", "  ");
    assert_eq!(state_dir(), None);

    std::env::remove_var("GROWPANEL_STATE_DIR");
    assert_eq!(state_dir(), None);
}

#[test]
fn test_dev_token_unset() {
    std::env::remove_var("GROWPANEL_DEV_TOKEN");
    assert!(dev_token().is_none());
}
