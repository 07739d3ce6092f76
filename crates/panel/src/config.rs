// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration management.
//!
//! Configuration is stored in `config.toml` and includes:
//! - `base_url`: HTTP(S) address of the backend
//! - `environment`: `production` or `development`, selecting the credential key
//! - `room`: the room whose mediums the panel follows
//! - `[reconnect]`, `[commands]`, `[editing]`: timing knobs with defaults

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gp_core::backoff::{self, BackoffPolicy};

use crate::env;
use crate::error::{Error, Result};

const STATE_DIR_NAME: &str = "growpanel";
const CONFIG_FILE_NAME: &str = "config.toml";
const CREDENTIALS_FILE_NAME: &str = "credentials.json";
const WEBSOCKET_PATH: &str = "/api/websocket";
const STATES_PATH: &str = "/api/states";

/// Which backend deployment the client talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    /// Key under which the access token is persisted.
    pub fn credential_key(self) -> &'static str {
        match self {
            Environment::Production => "access_token",
            Environment::Development => "dev_access_token",
        }
    }

    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

/// Client configuration stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backend address, `http://` or `https://`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub environment: Environment,
    /// Room followed by `watch` unless overridden on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub commands: CommandConfig,
    #[serde(default)]
    pub editing: EditingConfig,
}

/// Reconnect backoff and lost-connection handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// First retry delay in milliseconds (default: 1000).
    #[serde(default = "default_floor_ms")]
    pub floor_ms: u64,
    /// Upper bound on the retry delay in milliseconds (default: 30000).
    #[serde(default = "default_ceiling_ms")]
    pub ceiling_ms: u64,
    /// Scheduled reconnects before giving up (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Consecutive authorization failures before the token is discarded (default: 3).
    #[serde(default = "default_max_unauthorized_attempts")]
    pub max_unauthorized_attempts: u32,
    /// Time a dropped transport gets to come back on its own (default: 1000).
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

/// Request/reply command retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Retries after the first attempt (default: 2).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Wait before retry `n` is `n * retry_step_ms` (default: 500).
    #[serde(default = "default_retry_step_ms")]
    pub retry_step_ms: u64,
}

/// Edit coalescing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditingConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_stop_editing_delay_ms")]
    pub stop_editing_delay_ms: u64,
}

fn default_base_url() -> String {
    "http://homeassistant.local:8123".to_string()
}

fn default_floor_ms() -> u64 {
    backoff::DEFAULT_FLOOR.as_millis() as u64
}

fn default_ceiling_ms() -> u64 {
    backoff::DEFAULT_CEILING.as_millis() as u64
}

fn default_max_attempts() -> u32 {
    backoff::MAX_RECONNECT_ATTEMPTS
}

fn default_max_unauthorized_attempts() -> u32 {
    3
}

fn default_grace_period_ms() -> u64 {
    1_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_step_ms() -> u64 {
    500
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_stop_editing_delay_ms() -> u64 {
    1_000
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: default_base_url(),
            environment: Environment::default(),
            room: None,
            reconnect: ReconnectConfig::default(),
            commands: CommandConfig::default(),
            editing: EditingConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            floor_ms: default_floor_ms(),
            ceiling_ms: default_ceiling_ms(),
            max_attempts: default_max_attempts(),
            max_unauthorized_attempts: default_max_unauthorized_attempts(),
            grace_period_ms: default_grace_period_ms(),
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        CommandConfig {
            max_retries: default_max_retries(),
            retry_step_ms: default_retry_step_ms(),
        }
    }
}

impl Default for EditingConfig {
    fn default() -> Self {
        EditingConfig {
            debounce_ms: default_debounce_ms(),
            stop_editing_delay_ms: default_stop_editing_delay_ms(),
        }
    }
}

impl ReconnectConfig {
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            floor: Duration::from_millis(self.floor_ms),
            ceiling: Duration::from_millis(self.ceiling_ms),
            multiplier: backoff::DEFAULT_MULTIPLIER,
            max_attempts: self.max_attempts,
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl CommandConfig {
    pub fn retry_step(&self) -> Duration {
        Duration::from_millis(self.retry_step_ms)
    }
}

impl EditingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn stop_editing_delay(&self) -> Duration {
        Duration::from_millis(self.stop_editing_delay_ms)
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Resolves and loads the configuration.
    ///
    /// An explicit path or `GROWPANEL_CONFIG` must exist; the file in the
    /// state directory is optional and defaults apply without it.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = env::config_path() {
            return Self::load(&path);
        }
        let path = default_state_dir().join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Saves configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Checks the values a session cannot recover from at runtime.
    pub fn validate(&self) -> Result<()> {
        if let Some(msg) = validate_base_url(&self.base_url) {
            return Err(Error::Config(msg));
        }
        let reconnect = &self.reconnect;
        if reconnect.floor_ms == 0 {
            return Err(Error::Config(
                "reconnect.floor_ms must be greater than zero".to_string(),
            ));
        }
        if reconnect.ceiling_ms < reconnect.floor_ms {
            return Err(Error::Config(format!(
                "reconnect.ceiling_ms ({}) is below reconnect.floor_ms ({})",
                reconnect.ceiling_ms, reconnect.floor_ms
            )));
        }
        Ok(())
    }

    /// WebSocket endpoint derived from `base_url`.
    pub fn ws_url(&self) -> Result<String> {
        websocket_url(&self.base_url)
    }

    /// REST endpoint for the full entity collection.
    pub fn states_url(&self) -> String {
        states_url(&self.base_url)
    }
}

/// Appends the REST states path to `base_url`.
pub fn states_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), STATES_PATH)
}

/// Maps `http(s)://host` to `ws(s)://host/api/websocket`.
pub fn websocket_url(base_url: &str) -> Result<String> {
    let base = base_url.trim_end_matches('/');
    let rest = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        return Err(Error::Config(format!(
            "invalid base URL '{}': must start with http:// or https://",
            base_url
        )));
    };
    Ok(format!("{}{}", rest, WEBSOCKET_PATH))
}

fn validate_base_url(url: &str) -> Option<String> {
    let host = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match host {
        None => Some(format!(
            "invalid base URL '{}': must start with http:// or https://",
            url
        )),
        Some(host) if host.trim_end_matches('/').is_empty() => {
            Some(format!("invalid base URL '{}': missing host", url))
        }
        Some(_) => None,
    }
}

/// State directory: `GROWPANEL_STATE_DIR`, then `$XDG_STATE_HOME/growpanel`,
/// then `~/.local/state/growpanel`.
pub fn default_state_dir() -> PathBuf {
    if let Some(dir) = env::state_dir() {
        return dir;
    }
    if let Some(dir) = env::xdg_state_home() {
        return dir.join(STATE_DIR_NAME);
    }
    dirs::home_dir()
        .map(|h| h.join(".local/state").join(STATE_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".local/state").join(STATE_DIR_NAME))
}

/// Default location of the persisted credentials.
pub fn credentials_path(state_dir: &Path) -> PathBuf {
    state_dir.join(CREDENTIALS_FILE_NAME)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
