//! `/health` endpoint body.

use serde::Serialize;
use std::time::Instant;

/// Liveness report with the relay's live counters.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` whenever the server can answer.
    pub status: &'static str,
    /// Seconds since the server was created.
    pub uptime_secs: u64,
    /// Registered connections right now.
    pub connections: usize,
    /// Messages the dispatcher has fanned out.
    pub messages_relayed: u64,
}

/// Snapshot the counters into a response.
pub fn health_check(start_time: Instant, connections: usize, messages_relayed: u64) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        messages_relayed,
    }
}
