//! # camrelay-telemetry
//!
//! Process-wide observability for the relay: the `tracing` subscriber and
//! the Prometheus recorder behind `/metrics`.
//!
//! Call [`init_logging`] once at startup, then [`metrics::install_recorder`].

#![deny(unsafe_code)]

pub mod metrics;

use camrelay_settings::LoggingSettings;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use metrics::{install_recorder, render};

/// Errors raised while installing global telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured filter directive did not parse.
    #[error("invalid log filter '{directive}': {message}")]
    InvalidFilter {
        /// The rejected directive.
        directive: String,
        /// Parser message.
        message: String,
    },
    /// A global subscriber was already installed.
    #[error("failed to install log subscriber: {0}")]
    Subscriber(String),
    /// The Prometheus recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    Recorder(String),
}

/// Build the filter: `RUST_LOG` if set and valid, otherwise the configured level.
pub fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.level).map_err(|e| TelemetryError::InvalidFilter {
        directive: settings.level.clone(),
        message: e.to_string(),
    })
}

/// Install the global `tracing` subscriber.
///
/// JSON lines when `settings.json`, compact human output otherwise.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), TelemetryError> {
    let filter = build_filter(settings)?;

    let fmt_layer = if settings.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))
}
