//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use relay_settings::RelaySettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration for [`crate::server::RelayServer`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Route prefix for the static client and the WebSocket endpoint.
    pub chat_path: String,
    /// Directory served under `<chat_path>/`.
    pub static_dir: PathBuf,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Pending-queue capacity.
    pub queue_capacity: usize,
    /// Per-recipient write deadline in milliseconds.
    pub write_timeout_ms: u64,
    /// Shutdown drain deadline in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &RelaySettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            chat_path: settings.server.chat_path.clone(),
            static_dir: PathBuf::from(&settings.server.static_dir),
            max_message_size: settings.server.max_message_size,
            queue_capacity: settings.relay.queue_capacity,
            write_timeout_ms: settings.relay.write_timeout_ms,
            shutdown_timeout_ms: settings.relay.shutdown_timeout_ms,
        }
    }

    /// Per-recipient write deadline.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Shutdown drain deadline.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Chat prefix without a trailing slash (`""` when mounted at the root).
    pub fn chat_prefix(&self) -> &str {
        self.chat_path.trim_end_matches('/')
    }

    /// Path of the WebSocket endpoint.
    pub fn ws_path(&self) -> String {
        format!("{}/ws", self.chat_prefix())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            chat_path: "/chat".into(),
            static_dir: PathBuf::from("../public"),
            max_message_size: 1 << 20,
            queue_capacity: 1024,
            write_timeout_ms: 10_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}
