//! # Configuration
//!
//! Service configuration loaded from an optional TOML file with per-key
//! environment overrides.
//!
//! Locations, in precedence order:
//! 1. environment variables (`HERMES_HTTP_PORT`, `HERMES_CHAT_PORT`, ...)
//! 2. the TOML file named by `HERMES_CONFIG`, or `./hermes.toml`
//! 3. built-in defaults
//!
//! ## Example
//!
//! ```toml
//! [http]
//! port = 8081
//!
//! [chat]
//! port = 8082
//!
//! [dispatcher]
//! sla_ms = 30000
//!
//! [room]
//! buffer_size = 256
//!
//! [session]
//! buffer_size = 64
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HermesError, HermesResult};

const CONFIG_ENV: &str = "HERMES_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "hermes.toml";

/// Top-level configuration for both Hermes services.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HermesConfig {
    pub http: HttpConfig,
    pub chat: ChatConfig,
    pub dispatcher: DispatcherConfig,
    pub room: RoomConfig,
    pub session: SessionConfig,
    pub shutdown: ShutdownConfig,
}

/// Dispatch HTTP API settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { port: 8081 }
    }
}

/// Chat WebSocket settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChatConfig {
    pub port: u16,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { port: 8082 }
    }
}

/// Dispatcher SLA settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatcherConfig {
    /// How long `submit` waits synchronously before returning a handle.
    pub sla_ms: u64,
}

impl DispatcherConfig {
    pub fn sla(&self) -> Duration {
        Duration::from_millis(self.sla_ms)
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { sla_ms: 30_000 }
    }
}

/// Per-room broadcast buffer settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoomConfig {
    pub buffer_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self { buffer_size: 256 }
    }
}

/// Per-session outbound queue settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { buffer_size: 64 }
    }
}

/// Graceful-shutdown settings shared by both binaries.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Grace period for in-flight work before the process exits anyway.
    pub grace_ms: u64,
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_ms: 30_000 }
    }
}

impl HermesConfig {
    /// Load configuration from the discovered file (if any) and apply
    /// environment overrides. A missing file is not an error; an unreadable
    /// or unparseable one is, so a typo never silently reverts a deployment
    /// to defaults.
    pub fn load() -> HermesResult<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = if Path::new(&path).is_file() {
            let contents = std::fs::read_to_string(&path)?;
            let config = Self::from_toml_str(&contents)?;
            tracing::debug!(path = %path, "Loaded configuration file");
            config
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a configuration document. Unknown keys are ignored, missing
    /// sections fall back to defaults.
    pub fn from_toml_str(contents: &str) -> HermesResult<Self> {
        toml::from_str(contents).map_err(HermesError::config)
    }

    fn apply_env_overrides(&mut self) {
        override_from_env("HERMES_HTTP_PORT", &mut self.http.port);
        override_from_env("HERMES_CHAT_PORT", &mut self.chat.port);
        override_from_env("HERMES_DISPATCHER_SLA_MS", &mut self.dispatcher.sla_ms);
        override_from_env("HERMES_ROOM_BUFFER_SIZE", &mut self.room.buffer_size);
        override_from_env("HERMES_SESSION_BUFFER_SIZE", &mut self.session.buffer_size);
        override_from_env("HERMES_SHUTDOWN_GRACE_MS", &mut self.shutdown.grace_ms);
    }
}

/// Overwrite `slot` with the parsed value of `key` when the variable is set
/// and parseable; warn and keep the current value otherwise.
fn override_from_env<T: FromStr>(key: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring unparseable environment override");
            }
        }
    }
}
