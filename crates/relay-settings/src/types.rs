//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a partial
//! JSON file only needs the keys it overrides.

use relay_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000, "staticDir": "./public" },
///   "relay": { "queueCapacity": 4096 },
///   "logging": { "level": "debug", "format": "json" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Network and HTTP surface.
    pub server: ServerSettings,
    /// Queue and fan-out tuning.
    pub relay: RelayTuning,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.relay.queue_capacity == 0 {
            return Err(SettingsError::invalid(
                "relay.queueCapacity",
                "must be greater than 0",
            ));
        }
        if self.relay.write_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "relay.writeTimeoutMs",
                "must be greater than 0",
            ));
        }
        if !self.server.chat_path.starts_with('/') {
            return Err(SettingsError::invalid(
                "server.chatPath",
                format!("must start with '/', got {:?}", self.server.chat_path),
            ));
        }
        if self.server.max_message_size == 0 {
            return Err(SettingsError::invalid(
                "server.maxMessageSize",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Network and HTTP surface settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Route prefix: static files under `<chatPath>/`, WebSocket at `<chatPath>/ws`.
    pub chat_path: String,
    /// Directory of static client assets.
    pub static_dir: String,
    /// Largest accepted inbound WebSocket message, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            chat_path: "/chat".to_string(),
            static_dir: "../public".to_string(),
            max_message_size: 1 << 20,
        }
    }
}

/// Queue and fan-out tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayTuning {
    /// Capacity of the pending-message queue. Producers wait when it is full.
    pub queue_capacity: usize,
    /// Per-recipient write deadline in milliseconds.
    pub write_timeout_ms: u64,
    /// How long shutdown waits for background tasks, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl Default for RelayTuning {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            write_timeout_ms: 10_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
