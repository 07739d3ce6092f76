// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod auth;
pub mod status;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use crate::config::credentials_path;
use crate::credentials::{CredentialStore, FileCredentialStore};

/// Token store inside `state_dir`.
pub fn open_store(state_dir: &Path) -> Arc<dyn CredentialStore> {
    Arc::new(FileCredentialStore::new(credentials_path(state_dir)))
}
