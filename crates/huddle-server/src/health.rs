//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Connections registered with the broker.
    pub connections: usize,
    /// Groups with at least one live connection.
    pub active_groups: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, active_groups: usize) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        active_groups,
    }
}
