//! WebSocket session lifecycle: one accepted socket from upgrade through
//! disconnect.
//!
//! The reader half turns socket traffic into [`ConnectionEvent`]s handled
//! sequentially against the relay. A writer task drains the connection's
//! outbound queue into the socket.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use camrelay_core::{Frame, FrameKind, HandshakeInfo, OutboundMessage, RelayError};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::connection::Connection;
use crate::relay::{Accepted, Relay};

/// Close code sent to a producer replaced under the close-previous policy.
pub const CLOSE_SUPERSEDED: u16 = 4000;
/// Close code sent on server shutdown (going away).
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// How long the writer gets to flush a close frame after the reader stops.
const WRITER_GRACE: Duration = Duration::from_secs(1);

/// Everything that can happen to a connection, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection was accepted and classified.
    Connected,
    /// A data frame arrived.
    MessageReceived(Frame),
    /// The peer, the relay, or the server closed the connection.
    Closed,
    /// The transport failed.
    ErrorOccurred(String),
}

/// Accept a socket into `relay` and run it until it closes.
pub async fn run_session(
    ws: WebSocket,
    relay: Arc<Relay>,
    info: HandshakeInfo,
    shutdown: CancellationToken,
) {
    let Accepted {
        connection,
        outbound,
    } = relay.accept(&info);
    drive(ws, relay, connection, outbound, shutdown).await;
}

#[instrument(skip_all, fields(conn_id = %connection.id, role = %connection.role))]
async fn drive(
    ws: WebSocket,
    relay: Arc<Relay>,
    connection: Arc<Connection>,
    outbound: mpsc::Receiver<OutboundMessage>,
    shutdown: CancellationToken,
) {
    let (ws_tx, mut ws_rx) = ws.split();
    let done = CancellationToken::new();
    let close = connection.close_requested();

    let mut writer = tokio::spawn(write_loop(
        ws_tx,
        outbound,
        connection.clone(),
        close.clone(),
        shutdown.clone(),
        done.clone(),
    ));

    let _ = handle_event(&relay, &connection, ConnectionEvent::Connected);

    loop {
        let event = tokio::select! {
            () = close.cancelled() => ConnectionEvent::Closed,
            () = shutdown.cancelled() => ConnectionEvent::Closed,
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    ConnectionEvent::MessageReceived(Frame::text(text.as_str()))
                }
                Some(Ok(Message::Binary(data))) => {
                    ConnectionEvent::MessageReceived(Frame::binary(data))
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => ConnectionEvent::Closed,
                Some(Err(e)) => ConnectionEvent::ErrorOccurred(e.to_string()),
            },
        };
        if handle_event(&relay, &connection, event).is_break() {
            break;
        }
    }

    relay.disconnect(&connection);
    done.cancel();
    if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
}

/// Apply one event to the relay. `Break` ends the session.
pub fn handle_event(
    relay: &Relay,
    connection: &Connection,
    event: ConnectionEvent,
) -> ControlFlow<()> {
    match event {
        ConnectionEvent::Connected => {
            debug!("session started");
            ControlFlow::Continue(())
        }
        ConnectionEvent::MessageReceived(frame) => {
            let _ = relay.forward(connection, frame);
            ControlFlow::Continue(())
        }
        ConnectionEvent::Closed => {
            debug!("session closed");
            ControlFlow::Break(())
        }
        ConnectionEvent::ErrorOccurred(cause) => {
            warn!(error = %cause, "transport error, closing connection");
            ControlFlow::Break(())
        }
    }
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<OutboundMessage>,
    connection: Arc<Connection>,
    close: CancellationToken,
    shutdown: CancellationToken,
    done: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = close.cancelled() => {
                let _ = ws_tx.send(close_message(CLOSE_SUPERSEDED, "superseded")).await;
                break;
            }
            () = shutdown.cancelled() => {
                let _ = ws_tx.send(close_message(CLOSE_GOING_AWAY, "server shutting down")).await;
                break;
            }
            () = done.cancelled() => break,
            msg = outbound.recv() => {
                let Some(msg) = msg else { break };
                let ws_msg = match to_ws_message(msg) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(error = %e, kind = e.error_kind(), "failed to encode outbound message");
                        continue;
                    }
                };
                if ws_tx.send(ws_msg).await.is_err() {
                    break;
                }
            }
        }
    }
    connection.mark_closed();
}

fn close_message(code: u16, reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}

/// Encode an outbound message as a WebSocket frame.
///
/// Frames keep the type they arrived with; control messages are JSON text.
pub fn to_ws_message(msg: OutboundMessage) -> Result<Message, RelayError> {
    match msg {
        OutboundMessage::Frame(frame) => Ok(match frame.kind {
            FrameKind::Text => match std::str::from_utf8(&frame.payload) {
                Ok(text) => Message::Text(text.into()),
                Err(_) => Message::Binary(frame.payload),
            },
            FrameKind::Binary => Message::Binary(frame.payload),
        }),
        OutboundMessage::Control(control) => Ok(Message::Text(control.to_json()?.into())),
    }
}
