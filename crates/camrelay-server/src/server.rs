//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::header::{CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use camrelay_core::{HandshakeInfo, RelayError};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::HealthResponse;
use crate::relay::{Relay, RelayConfig};
use crate::session::run_session;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The relay hub.
    pub relay: Arc<Relay>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    relay: Arc<Relay>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
}

impl RelayServer {
    /// Create a new server around a fresh relay.
    pub fn new(
        config: ServerConfig,
        relay_config: RelayConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            config,
            relay: Arc::new(Relay::new(relay_config)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    ///
    /// Every path other than `/health` and `/metrics` is a WebSocket upgrade.
    pub fn router(&self) -> Router {
        let state = AppState {
            relay: self.relay.clone(),
            shutdown: self.shutdown.clone(),
            metrics: self.metrics.clone(),
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .fallback(ws_handler)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the listener and serve in a background task.
    ///
    /// Returns the bound address and the server task. The task finishes once
    /// [`ShutdownCoordinator::shutdown`] is called and open requests drain.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), RelayError> {
        if self.config.host.trim().is_empty() {
            return Err(RelayError::InvalidAddress(self.config.bind_address()));
        }
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local = listener.local_addr().map_err(RelayError::Serve)?;
        info!(addr = %local, "relay listening");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server error");
            }
        });
        Ok((local, handle))
    }

    /// Get the relay.
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.relay.liveness())
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            camrelay_telemetry::render(handle),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Any other path: WebSocket upgrade, classified from the handshake.
async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    uri: Uri,
    State(state): State<AppState>,
) -> Response {
    let info = handshake_info(&headers, &uri);
    let relay = state.relay.clone();
    let coordinator = state.shutdown.clone();

    ws.max_message_size(state.max_message_size)
        .on_failed_upgrade(|e| warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| {
            let token = coordinator.token();
            coordinator.track_session(run_session(socket, relay, info, token))
        })
}

/// Capture the classification inputs from an upgrade request.
///
/// A `User-Agent` with non-UTF-8 bytes is decoded lossily so an ASCII
/// producer marker elsewhere in the header still matches.
fn handshake_info(headers: &HeaderMap, uri: &Uri) -> HandshakeInfo {
    HandshakeInfo {
        user_agent: headers
            .get(USER_AGENT)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
        query: uri.query().map(str::to_owned),
    }
}
