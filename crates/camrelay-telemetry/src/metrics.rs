//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::TelemetryError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, TelemetryError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::Recorder(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across crates.

/// Connections accepted (counter, labels: role).
pub const RELAY_CONNECTIONS_TOTAL: &str = "relay_connections_total";
/// Connections closed (counter, labels: role).
pub const RELAY_DISCONNECTIONS_TOTAL: &str = "relay_disconnections_total";
/// Registered consumers (gauge).
pub const RELAY_CONSUMERS_ACTIVE: &str = "relay_consumers_active";
/// 1 while the producer slot is occupied (gauge).
pub const RELAY_PRODUCER_CONNECTED: &str = "relay_producer_connected";
/// Frames received from the current producer (counter).
pub const RELAY_FRAMES_RECEIVED_TOTAL: &str = "relay_frames_received_total";
/// Frame copies enqueued to consumers (counter).
pub const RELAY_FRAMES_FORWARDED_TOTAL: &str = "relay_frames_forwarded_total";
/// Payload bytes received from the current producer (counter).
pub const RELAY_FRAME_BYTES_TOTAL: &str = "relay_frame_bytes_total";
/// Per-consumer sends that did not happen (counter, labels: reason).
pub const RELAY_BROADCAST_DROPS_TOTAL: &str = "relay_broadcast_drops_total";
/// Frames from a superseded producer, not forwarded (counter).
pub const RELAY_ORPHANED_FRAMES_TOTAL: &str = "relay_orphaned_frames_total";
/// Connection lifetime (histogram, labels: role).
pub const RELAY_CONNECTION_DURATION_SECONDS: &str = "relay_connection_duration_seconds";
