//! # camrelay-server
//!
//! Axum HTTP + `WebSocket` server relaying camera frames from one producer
//! to any number of consumers.
//!
//! - [`relay`]: producer slot and consumer registry behind one lock
//! - [`forward`]: best-effort fan-out into per-connection queues
//! - [`session`]: per-connection event loop and writer task
//! - [`server`]: routes (`/health`, `/metrics`, WebSocket fallback), CORS
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod forward;
pub mod health;
pub mod producer;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod status;

pub use config::ServerConfig;
pub use connection::Connection;
pub use relay::{Accepted, ForwardOutcome, Relay, RelayConfig, RelayStats};
pub use server::RelayServer;
pub use shutdown::ShutdownCoordinator;
