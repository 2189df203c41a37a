//! Relay error types.

use std::fmt;

use thiserror::Error;

/// Readiness of a connection, checked before every send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyState {
    /// Accepting outbound messages.
    Open,
    /// Close initiated; no further sends.
    Closing,
    /// Transport gone.
    Closed,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        })
    }
}

/// Why a single send to a connection did not happen.
///
/// Always isolated to that one connection; never propagated to the producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SendError {
    /// The connection was not open at send time.
    #[error("connection not open ({0})")]
    NotOpen(ReadyState),
    /// The outbound queue was full; the message is dropped.
    #[error("outbound queue full")]
    QueueFull,
    /// The writer side has gone away.
    #[error("connection closed")]
    Closed,
}

impl SendError {
    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotOpen(_) => "not_open",
            Self::QueueFull => "queue_full",
            Self::Closed => "closed",
        }
    }
}

/// Errors surfaced by the relay server.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The listen socket could not be bound. Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configured host/port did not form a socket address.
    #[error("invalid listen address: {0}")]
    InvalidAddress(String),
    /// The HTTP server loop failed.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
    /// A control message could not be encoded.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RelayError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Bind { .. } => "bind",
            Self::InvalidAddress(_) => "invalid_address",
            Self::Serve(_) => "serve",
            Self::Encode(_) => "encode",
        }
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
