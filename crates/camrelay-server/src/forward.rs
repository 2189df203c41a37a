//! Frame fan-out to registered consumers.

use camrelay_core::{Frame, OutboundMessage, SendError};
use camrelay_telemetry::metrics::{RELAY_BROADCAST_DROPS_TOTAL, RELAY_FRAMES_FORWARDED_TOTAL};
use metrics::counter;
use tracing::{debug, warn};

use crate::registry::ConsumerRegistry;

/// Outcome of one fan-out pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Consumers the frame was enqueued for.
    pub delivered: usize,
    /// Consumers skipped because they were not open.
    pub skipped: usize,
    /// Consumers whose outbound queue was full.
    pub dropped_full: usize,
    /// Consumers whose writer had already gone away.
    pub failed_closed: usize,
}

impl BroadcastReport {
    /// Consumers that did not get the frame.
    pub fn undelivered(&self) -> usize {
        self.skipped + self.dropped_full + self.failed_closed
    }
}

/// Enqueue `frame` for every open consumer in `registry`.
///
/// Never blocks and never fails: each consumer's send is isolated, and a
/// failure is logged and counted against that consumer only.
pub fn broadcast(registry: &ConsumerRegistry, frame: &Frame) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    registry.for_each(|conn| {
        if !conn.is_open() {
            report.skipped += 1;
            return;
        }
        match conn.send(OutboundMessage::Frame(frame.clone())) {
            Ok(()) => report.delivered += 1,
            Err(err) => {
                match err {
                    SendError::NotOpen(_) => report.skipped += 1,
                    SendError::QueueFull => report.dropped_full += 1,
                    SendError::Closed => report.failed_closed += 1,
                }
                counter!(RELAY_BROADCAST_DROPS_TOTAL, "reason" => err.reason()).increment(1);
                warn!(conn_id = %conn.id, reason = err.reason(), "failed to send frame to consumer");
            }
        }
    });

    counter!(RELAY_FRAMES_FORWARDED_TOTAL).increment(report.delivered as u64);
    debug!(
        bytes = frame.len(),
        recipients = registry.len(),
        delivered = report.delivered,
        undelivered = report.undelivered(),
        "broadcast frame"
    );
    report
}
