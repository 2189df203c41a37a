//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a config
//! file may list only the fields it changes.

use serde::{Deserialize, Serialize};

/// Root settings for the relay process.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "producer": { "takeover": "close-previous" },
///   "logging": { "json": true }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Listener and per-connection limits.
    pub server: ServerSettings,
    /// Producer recognition and takeover behavior.
    pub producer: ProducerSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Correct values that would make the relay unusable.
    ///
    /// Called automatically during loading. Bad values are corrected with a
    /// warning rather than rejected.
    pub fn validate(&mut self) {
        if self.server.outbound_queue == 0 {
            tracing::warn!("outbound_queue must be at least 1, using 1");
            self.server.outbound_queue = 1;
        }
        if self.server.max_message_size == 0 {
            let fallback = ServerSettings::default().max_message_size;
            tracing::warn!(fallback, "max_message_size must be positive, using default");
            self.server.max_message_size = fallback;
        }
        if self.producer.user_agent_marker.is_empty() {
            tracing::warn!("empty user agent marker, producers only match by query parameter");
        }
    }
}

/// Listener settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (`PORT` env var).
    pub port: u16,
    /// Outbound queue depth per connection. A consumer whose queue is full
    /// at broadcast time misses that frame.
    pub outbound_queue: usize,
    /// Maximum accepted WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Seconds to wait for the server task on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            outbound_queue: 64,
            max_message_size: 16 * 1024 * 1024,
            shutdown_timeout_secs: 10,
        }
    }
}

/// What happens to a still-open producer when a newer one connects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TakeoverPolicy {
    /// The old connection stays open but is no longer forwarded.
    #[default]
    Orphan,
    /// The old connection is closed by the relay.
    ClosePrevious,
}

/// Producer recognition settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProducerSettings {
    /// Substring of the `User-Agent` header that marks a producer.
    pub user_agent_marker: String,
    /// Query parameter name that marks a producer.
    pub source_param: String,
    /// Query parameter value that marks a producer.
    pub source_value: String,
    /// Second-producer behavior.
    pub takeover: TakeoverPolicy,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            user_agent_marker: "Python".to_string(),
            source_param: "source".to_string(),
            source_value: "rpi".to_string(),
            takeover: TakeoverPolicy::Orphan,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
