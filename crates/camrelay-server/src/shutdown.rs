//! Server shutdown: stop accepting, close every live session, then wait.
//!
//! Sessions run on tasks spawned by the WebSocket upgrade, outside the
//! `axum::serve` task, so they are tracked separately and drained after the
//! listener stops.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Owns the shutdown signal and the set of running sessions.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// A coordinator with no sessions and shutdown not requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled when shutdown starts. Sessions and the listener watch it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wrap a session future so [`ShutdownCoordinator::drain`] waits for it.
    pub fn track_session<F>(&self, session: F) -> impl Future<Output = F::Output> + Send + 'static + use<F>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.sessions.track_future(session)
    }

    /// Sessions still running.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Signal shutdown without waiting.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Signal shutdown, then wait for the server task and every session.
    ///
    /// Returns `false` if `timeout` elapsed first; whatever is still running
    /// is left to the runtime.
    pub async fn drain(&self, server: JoinHandle<()>, timeout: Duration) -> bool {
        self.shutdown();
        let _ = self.sessions.close();
        info!(
            sessions = self.active_sessions(),
            timeout_secs = timeout.as_secs(),
            "draining relay"
        );

        let all_stopped = async {
            let _ = server.await;
            self.sessions.wait().await;
        };
        if tokio::time::timeout(timeout, all_stopped).await.is_err() {
            warn!(
                sessions = self.active_sessions(),
                "shutdown timed out after {timeout:?}"
            );
            return false;
        }
        true
    }
}
