//! Per-connection handle shared between the relay and the socket tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use camrelay_core::{ConnectionId, OutboundMessage, ReadyState, Role, SendError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// One accepted WebSocket connection.
///
/// The relay never touches the socket directly: it pushes
/// [`OutboundMessage`]s into a bounded queue drained by the connection's
/// writer task.
pub struct Connection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Role assigned at accept time.
    pub role: Role,
    /// Send channel to the writer task.
    tx: mpsc::Sender<OutboundMessage>,
    state: AtomicU8,
    /// Fired when the relay wants this connection closed.
    close_token: CancellationToken,
    /// When this connection was accepted.
    pub connected_at: Instant,
    /// Count of messages not delivered to this connection.
    dropped_messages: AtomicU64,
}

impl Connection {
    /// Create a connection around an existing send channel.
    pub fn new(id: ConnectionId, role: Role, tx: mpsc::Sender<OutboundMessage>) -> Self {
        Self {
            id,
            role,
            tx,
            state: AtomicU8::new(OPEN),
            close_token: CancellationToken::new(),
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Create a connection with a fresh id and a queue of `capacity` messages.
    pub fn open(role: Role, capacity: usize) -> (Arc<Self>, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Arc::new(Self::new(ConnectionId::new(), role, tx)), rx)
    }

    /// Current readiness.
    pub fn ready_state(&self) -> ReadyState {
        match self.state.load(Ordering::Acquire) {
            OPEN => ReadyState::Open,
            CLOSING => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }

    /// Whether sends are currently accepted.
    pub fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Enqueue a message without waiting.
    ///
    /// Checks readiness first. A full queue drops the message; a vanished
    /// writer marks the connection closed.
    pub fn send(&self, message: OutboundMessage) -> Result<(), SendError> {
        let state = self.ready_state();
        if state != ReadyState::Open {
            self.record_drop();
            return Err(SendError::NotOpen(state));
        }
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.record_drop();
                Err(SendError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.record_drop();
                self.mark_closed();
                Err(SendError::Closed)
            }
        }
    }

    /// Ask the session to close this connection.
    ///
    /// Moves an open connection to `Closing`; the session observes the token
    /// and tears the socket down.
    pub fn request_close(&self) {
        let _ = self
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire);
        self.close_token.cancel();
    }

    /// Token cancelled by [`Connection::request_close`].
    pub fn close_requested(&self) -> CancellationToken {
        self.close_token.clone()
    }

    /// Mark the transport as gone. Idempotent.
    pub fn mark_closed(&self) {
        self.state.store(CLOSED, Ordering::Release);
    }

    fn record_drop(&self) {
        let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Total messages not delivered to this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("state", &self.ready_state())
            .finish_non_exhaustive()
    }
}
