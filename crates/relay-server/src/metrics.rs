//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Returns the handle `/metrics` renders from. Fails if a recorder is
/// already installed in this process.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render the Prometheus text exposition format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Connections accepted and registered (counter).
pub const RELAY_CONNECTIONS_TOTAL: &str = "relay_connections_total";
/// Connections currently registered (gauge).
pub const RELAY_CONNECTIONS_ACTIVE: &str = "relay_connections_active";
/// Readers that have exited (counter, labels: reason).
pub const RELAY_DISCONNECTIONS_TOTAL: &str = "relay_disconnections_total";
/// Messages decoded and published by readers (counter).
pub const RELAY_MESSAGES_RECEIVED_TOTAL: &str = "relay_messages_received_total";
/// Messages fully fanned out by the dispatcher (counter).
pub const RELAY_MESSAGES_DISPATCHED_TOTAL: &str = "relay_messages_dispatched_total";
/// Successful per-recipient writes (counter).
pub const RELAY_DELIVERIES_TOTAL: &str = "relay_deliveries_total";
/// Failed or timed-out per-recipient writes (counter, labels: kind).
pub const RELAY_WRITE_FAILURES_TOTAL: &str = "relay_write_failures_total";
/// Inbound frames that were not a valid chat message (counter).
pub const RELAY_DECODE_FAILURES_TOTAL: &str = "relay_decode_failures_total";
/// Upgrade requests rejected before a connection existed (counter).
pub const RELAY_HANDSHAKE_FAILURES_TOTAL: &str = "relay_handshake_failures_total";
/// Time to fan one message out to every recipient (histogram).
pub const RELAY_FANOUT_DURATION_SECONDS: &str = "relay_fanout_duration_seconds";
/// Lifetime of a connection from registration to reader exit (histogram).
pub const RELAY_CONNECTION_DURATION_SECONDS: &str = "relay_connection_duration_seconds";
