//! The relay hub: producer slot and consumer registry behind one lock.
//!
//! Every mutation and every fan-out takes the same `parking_lot::Mutex`, so
//! slot replacement, consumer registration and broadcast iteration are
//! serialized. Nothing under the lock awaits; sends are `try_send` into each
//! connection's bounded queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use camrelay_core::{
    ConnectionId, Frame, HandshakeInfo, OutboundMessage, ProducerSignature, Role, classify,
};
use camrelay_settings::{RelaySettings, TakeoverPolicy};
use camrelay_telemetry::metrics::{
    RELAY_CONNECTION_DURATION_SECONDS, RELAY_CONNECTIONS_TOTAL, RELAY_CONSUMERS_ACTIVE,
    RELAY_DISCONNECTIONS_TOTAL, RELAY_FRAME_BYTES_TOTAL, RELAY_FRAMES_RECEIVED_TOTAL,
    RELAY_ORPHANED_FRAMES_TOTAL, RELAY_PRODUCER_CONNECTED,
};
use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::forward::{BroadcastReport, broadcast};
use crate::health::{HealthResponse, health_check};
use crate::producer::ProducerSlot;
use crate::registry::ConsumerRegistry;
use crate::status;

/// Relay behaviour knobs.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// How producers are recognised.
    pub signature: ProducerSignature,
    /// What happens to a producer that gets replaced.
    pub takeover: TakeoverPolicy,
    /// Per-connection outbound queue depth.
    pub outbound_queue: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            signature: ProducerSignature::default(),
            takeover: TakeoverPolicy::default(),
            outbound_queue: 64,
        }
    }
}

impl RelayConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &RelaySettings) -> Self {
        Self {
            signature: ProducerSignature {
                user_agent_marker: settings.producer.user_agent_marker.clone(),
                source_param: settings.producer.source_param.clone(),
                source_value: settings.producer.source_value.clone(),
            },
            takeover: settings.producer.takeover,
            outbound_queue: settings.server.outbound_queue.max(1),
        }
    }
}

/// A freshly accepted connection and the receiving end of its queue.
#[derive(Debug)]
pub struct Accepted {
    /// Connection handle, already installed or registered.
    pub connection: Arc<Connection>,
    /// Drained by the connection's writer task.
    pub outbound: mpsc::Receiver<OutboundMessage>,
}

/// What happened to an inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Sent by the current producer and fanned out.
    Forwarded(BroadcastReport),
    /// Sent by a producer that has since been replaced.
    Orphaned,
    /// Sent by a consumer. Consumers have no inbound protocol.
    Ignored,
}

/// Point-in-time counters for diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    /// Current producer, if any.
    pub producer: Option<ConnectionId>,
    /// Registered consumers.
    pub consumers: usize,
    /// Producers installed since startup.
    pub producers_installed: u64,
    /// Frames fanned out since startup.
    pub frames_forwarded: u64,
    /// Frames dropped because their sender was no longer current.
    pub frames_orphaned: u64,
}

#[derive(Debug, Default)]
struct RelayState {
    producer: ProducerSlot,
    consumers: ConsumerRegistry,
}

/// Shared relay instance. One per server; cheap to share behind `Arc`.
#[derive(Debug)]
pub struct Relay {
    config: RelayConfig,
    state: Mutex<RelayState>,
    producers_installed: AtomicU64,
    frames_forwarded: AtomicU64,
    frames_orphaned: AtomicU64,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}

impl Relay {
    /// Create an empty relay.
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RelayState::default()),
            producers_installed: AtomicU64::new(0),
            frames_forwarded: AtomicU64::new(0),
            frames_orphaned: AtomicU64::new(0),
        }
    }

    /// Role a connection with this handshake would get.
    pub fn classify(&self, info: &HandshakeInfo) -> Role {
        classify(info, &self.config.signature)
    }

    /// Classify a new connection and install or register it.
    ///
    /// Producers replace the slot occupant. Consumers are registered and
    /// get their status message queued before any frame can reach them.
    pub fn accept(&self, info: &HandshakeInfo) -> Accepted {
        let role = self.classify(info);
        let (connection, outbound) = Connection::open(role, self.config.outbound_queue);
        counter!(RELAY_CONNECTIONS_TOTAL, "role" => role.as_str()).increment(1);

        match role {
            Role::Producer => {
                let _ = self.install_producer(connection.clone());
            }
            Role::Consumer => self.register_consumer(connection.clone()),
        }
        Accepted {
            connection,
            outbound,
        }
    }

    /// Make `conn` the forwarding source, returning the replaced producer.
    ///
    /// Under [`TakeoverPolicy::ClosePrevious`] the replaced producer is asked
    /// to close; otherwise it stays connected and its frames are dropped.
    pub fn install_producer(&self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        let previous = {
            let mut state = self.state.lock();
            let previous = state.producer.set_current(conn.clone());
            gauge!(RELAY_PRODUCER_CONNECTED).set(1.0);
            previous
        };
        let _ = self.producers_installed.fetch_add(1, Ordering::Relaxed);
        info!(conn_id = %conn.id, role = %conn.role, "producer connected");

        if let Some(prev) = previous.as_ref().filter(|p| p.id != conn.id) {
            match self.config.takeover {
                TakeoverPolicy::Orphan => {
                    warn!(conn_id = %prev.id, replaced_by = %conn.id, "previous producer orphaned");
                }
                TakeoverPolicy::ClosePrevious => {
                    info!(conn_id = %prev.id, replaced_by = %conn.id, "closing replaced producer");
                    prev.request_close();
                }
            }
        }
        previous
    }

    /// Register a consumer and queue its status message.
    pub fn register_consumer(&self, conn: Arc<Connection>) {
        let count = {
            let mut state = self.state.lock();
            if !state.consumers.add(conn.clone()) {
                return;
            }
            status::notify(&conn, state.producer.is_occupied());
            let count = state.consumers.len();
            gauge!(RELAY_CONSUMERS_ACTIVE).set(count as f64);
            count
        };
        info!(conn_id = %conn.id, role = %conn.role, consumers = count, "consumer connected");
    }

    /// Handle one inbound message from `from`.
    pub fn forward(&self, from: &Connection, frame: Frame) -> ForwardOutcome {
        if from.role != Role::Producer {
            debug!(conn_id = %from.id, bytes = frame.len(), "ignoring consumer message");
            return ForwardOutcome::Ignored;
        }

        let state = self.state.lock();
        if !state.producer.is_current(&from.id) {
            drop(state);
            let _ = self.frames_orphaned.fetch_add(1, Ordering::Relaxed);
            counter!(RELAY_ORPHANED_FRAMES_TOTAL).increment(1);
            debug!(conn_id = %from.id, bytes = frame.len(), "dropping frame from orphaned producer");
            return ForwardOutcome::Orphaned;
        }

        counter!(RELAY_FRAMES_RECEIVED_TOTAL).increment(1);
        counter!(RELAY_FRAME_BYTES_TOTAL).increment(frame.len() as u64);
        let report = broadcast(&state.consumers, &frame);
        drop(state);

        let _ = self.frames_forwarded.fetch_add(1, Ordering::Relaxed);
        ForwardOutcome::Forwarded(report)
    }

    /// Remove `conn` from its role's store and mark it closed.
    ///
    /// A producer only clears the slot if it is still the occupant. Gauges
    /// are updated under the lock so they cannot lag the stores.
    pub fn disconnect(&self, conn: &Connection) {
        conn.mark_closed();
        let dropped = conn.drop_count();
        match conn.role {
            Role::Producer => {
                let cleared = {
                    let mut state = self.state.lock();
                    let cleared = state.producer.clear_if_current(&conn.id);
                    if cleared {
                        gauge!(RELAY_PRODUCER_CONNECTED).set(0.0);
                    }
                    cleared
                };
                if cleared {
                    info!(conn_id = %conn.id, role = %conn.role, dropped, "producer disconnected");
                } else {
                    info!(conn_id = %conn.id, role = %conn.role, dropped, "replaced producer disconnected");
                }
            }
            Role::Consumer => {
                let count = {
                    let mut state = self.state.lock();
                    if state.consumers.remove(&conn.id) {
                        gauge!(RELAY_CONSUMERS_ACTIVE).set(state.consumers.len() as f64);
                    }
                    state.consumers.len()
                };
                info!(
                    conn_id = %conn.id,
                    role = %conn.role,
                    consumers = count,
                    dropped,
                    "consumer disconnected"
                );
            }
        }
        counter!(RELAY_DISCONNECTIONS_TOTAL, "role" => conn.role.as_str()).increment(1);
        histogram!(RELAY_CONNECTION_DURATION_SECONDS, "role" => conn.role.as_str())
            .record(conn.age().as_secs_f64());
    }

    /// Health body for `/health`.
    pub fn liveness(&self) -> HealthResponse {
        health_check(self.consumer_count())
    }

    /// Whether the producer slot is occupied.
    pub fn producer_connected(&self) -> bool {
        self.state.lock().producer.is_occupied()
    }

    /// Registered consumer count.
    pub fn consumer_count(&self) -> usize {
        self.state.lock().consumers.len()
    }

    /// Snapshot of relay counters.
    pub fn stats(&self) -> RelayStats {
        let (producer, consumers) = {
            let state = self.state.lock();
            (state.producer.current_id().cloned(), state.consumers.len())
        };
        RelayStats {
            producer,
            consumers,
            producers_installed: self.producers_installed.load(Ordering::Relaxed),
            frames_forwarded: self.frames_forwarded.load(Ordering::Relaxed),
            frames_orphaned: self.frames_orphaned.load(Ordering::Relaxed),
        }
    }
}
