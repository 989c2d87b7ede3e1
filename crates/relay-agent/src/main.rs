//! # relay-agent
//!
//! Chat relay binary: loads settings, starts logging and metrics, and runs
//! the HTTP/WebSocket server until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use relay_core::logging::{LogFormat, init_subscriber};
use relay_server::{RelayServer, ServerConfig};
use relay_settings::RelaySettings;

/// Chat relay server.
#[derive(Parser, Debug)]
#[command(name = "relay", about = "WebSocket chat relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Directory of static client assets (overrides settings).
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Settings file (default `~/.relay/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(dir) = &self.static_dir {
            settings.server.static_dir = dir.to_string_lossy().into_owned();
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.format = LogFormat::Json;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings first: they carry the log level.
    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(relay_settings::settings_path);
    let (mut settings, load_error) = match relay_settings::load_settings_from_path(&settings_path) {
        Ok(settings) => (settings, None),
        Err(e) => (RelaySettings::default(), Some(e)),
    };
    args.apply(&mut settings);

    init_subscriber(&settings.logging.level, settings.logging.format);
    if let Some(e) = load_error {
        tracing::warn!(path = %settings_path.display(), error = %e, "invalid settings, using defaults");
    }

    let config = ServerConfig::from_settings(&settings);
    let mut server = RelayServer::new(config);
    match relay_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    let handle = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        "chat relay listening on http://{} (static dir {})",
        handle.addr(),
        settings.server.static_dir
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.stop(handle).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
