//! One-shot producer presence notice for new consumers.

use camrelay_core::OutboundMessage;
use tracing::debug;

use crate::connection::Connection;

/// Queue a status message telling `conn` whether a producer is present.
///
/// Fire-and-forget: a failed send is logged at debug and otherwise ignored.
pub fn notify(conn: &Connection, producer_present: bool) {
    if let Err(err) = conn.send(OutboundMessage::status(producer_present)) {
        debug!(conn_id = %conn.id, reason = err.reason(), "status message not delivered");
    }
}

#[cfg(test)]
mod tests {
    use camrelay_core::{ControlMessage, Role, StatusMessage};

    use super::*;

    #[tokio::test]
    async fn sends_waiting_status() {
        let (conn, mut rx) = Connection::open(Role::Consumer, 4);
        notify(&conn, false);
        let msg = rx.recv().await.unwrap();
        assert_eq!(
            msg,
            OutboundMessage::Control(ControlMessage::Status(StatusMessage {
                connected: false,
                message: "Waiting for camera...".into(),
            }))
        );
    }

    #[tokio::test]
    async fn sends_streaming_status() {
        let (conn, mut rx) = Connection::open(Role::Consumer, 4);
        notify(&conn, true);
        assert_eq!(rx.recv().await.unwrap(), OutboundMessage::status(true));
    }

    #[test]
    fn failure_is_swallowed() {
        let (conn, rx) = Connection::open(Role::Consumer, 4);
        drop(rx);
        notify(&conn, true);
        assert_eq!(conn.drop_count(), 1);
    }
}
