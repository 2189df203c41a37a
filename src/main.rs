//! # camrelay
//!
//! Camera relay server binary: loads settings, installs telemetry and runs
//! the WebSocket relay until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use camrelay_server::{RelayConfig, RelayServer, ServerConfig};
use camrelay_settings::RelaySettings;
use clap::Parser;

/// Camera frame relay server.
#[derive(Parser, Debug)]
#[command(name = "camrelay", about = "Relay camera frames from one producer to many viewers")]
struct Cli {
    /// Path to a JSON settings file (overrides `CAMRELAY_CONFIG`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings and environment).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings and `PORT`).
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings =
        camrelay_settings::load_settings(args.config.as_deref()).context("Failed to load settings")?;
    args.apply(&mut settings);

    camrelay_telemetry::init_logging(&settings.logging).context("Failed to initialise logging")?;
    let metrics_handle =
        camrelay_telemetry::install_recorder().context("Failed to install metrics recorder")?;

    let config = ServerConfig::from_settings(&settings);
    let shutdown_timeout = config.shutdown_timeout();
    let server = RelayServer::new(
        config,
        RelayConfig::from_settings(&settings),
        Some(metrics_handle),
    );

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        takeover = ?settings.producer.takeover,
        "camrelay listening on ws://{addr}"
    );

    shutdown_signal().await.context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down...");
    if !server.shutdown().drain(handle, shutdown_timeout).await {
        tracing::warn!("server did not stop within {shutdown_timeout:?}");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = term.recv() => Ok(()),
    }
}

/// Resolve on Ctrl-C.
#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
