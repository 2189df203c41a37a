//! `/health` endpoint.

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Registered consumer count.
    pub clients: usize,
}

/// Build a health response from the live consumer count.
pub fn health_check(clients: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        clients,
    }
}
