//! Server configuration.

use std::time::Duration;

use camrelay_settings::RelaySettings;
use serde::{Deserialize, Serialize};

/// Configuration for the relay HTTP server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// How long shutdown waits for the server task.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            shutdown_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &RelaySettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_message_size: settings.server.max_message_size,
            shutdown_timeout_secs: settings.server.shutdown_timeout_secs,
        }
    }

    /// `host:port` as configured.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Shutdown grace period.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
