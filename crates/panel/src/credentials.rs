// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Access token persistence and the pre-connect credential check.
//!
//! Tokens are kept under an environment-specific key so production and
//! development logins do not overwrite each other.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::{websocket_url, Config, Environment};
use crate::env;
use crate::error::{Error, Result};

/// Persistent key/value storage for access tokens.
pub trait CredentialStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn store(&self, key: &str, token: &str) -> Result<()>;
    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Tokens in a JSON object file, e.g. `credentials.json` in the state dir.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCredentialStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                Error::Credentials(format!("corrupt {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn store(&self, key: &str, token: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), token.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(key: &str, token: &str) -> Self {
        let store = Self::new();
        store.entries.lock().insert(key.to_string(), token.to_string());
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn store(&self, key: &str, token: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), token.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// What a connection attempt needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// `http(s)` base, used for REST.
    pub base_url: String,
    /// `ws(s)` endpoint.
    pub ws_url: String,
    pub token: String,
}

/// Decides whether a connection may be attempted and owns token removal.
pub struct CredentialGate {
    base_url: String,
    environment: Environment,
    store: Arc<dyn CredentialStore>,
    dev_url: Option<String>,
    dev_token: Mutex<Option<String>>,
}

impl CredentialGate {
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> Self {
        CredentialGate {
            base_url: config.base_url.clone(),
            environment: config.environment,
            store,
            dev_url: None,
            dev_token: Mutex::new(None),
        }
    }

    /// Like [`CredentialGate::new`], picking up `GROWPANEL_DEV_URL` and
    /// `GROWPANEL_DEV_TOKEN` in development mode.
    pub fn from_env(config: &Config, store: Arc<dyn CredentialStore>) -> Self {
        let gate = Self::new(config, store);
        if config.environment.is_development() {
            gate.with_dev_overrides(env::dev_url(), env::dev_token())
        } else {
            gate
        }
    }

    /// Development-only URL and token that take precedence over config
    /// and store.
    pub fn with_dev_overrides(mut self, url: Option<String>, token: Option<String>) -> Self {
        if self.environment.is_development() {
            self.dev_url = url;
            self.dev_token = Mutex::new(token);
        }
        self
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn key(&self) -> &'static str {
        self.environment.credential_key()
    }

    /// Resolves URL and token, or explains why a connection cannot be tried.
    pub fn validate(&self) -> Result<Credentials> {
        let base_url = match (&self.dev_url, self.environment) {
            (Some(url), Environment::Development) => url.clone(),
            _ => self.base_url.clone(),
        };
        if base_url.trim().is_empty() {
            let msg = if self.environment.is_development() {
                "development mode requires a backend URL (set GROWPANEL_DEV_URL or base_url)"
            } else {
                "no backend URL configured (set base_url)"
            };
            return Err(Error::Config(msg.to_string()));
        }
        let ws_url = websocket_url(&base_url)?;

        let token = match self.dev_token.lock().clone() {
            Some(token) => Some(token),
            None => self.store.load(self.key())?,
        };
        let token = token.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
            Error::Config("no access token stored\n  hint: run 'growpanel login --token <TOKEN>'".to_string())
        })?;

        Ok(Credentials {
            base_url,
            ws_url,
            token,
        })
    }

    /// True when [`CredentialGate::validate`] would succeed.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn has_token(&self) -> bool {
        self.dev_token.lock().is_some() || matches!(self.store.load(self.key()), Ok(Some(_)))
    }

    pub fn store_token(&self, token: &str) -> Result<()> {
        self.store.store(self.key(), token)?;
        info!(key = self.key(), "access token stored");
        Ok(())
    }

    /// Forgets the token so no further connection is attempted with it.
    pub fn invalidate(&self) {
        self.dev_token.lock().take();
        match self.store.remove(self.key()) {
            Ok(()) => warn!(key = self.key(), "access token removed"),
            Err(e) => warn!(key = self.key(), error = %e, "failed to remove access token"),
        }
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
