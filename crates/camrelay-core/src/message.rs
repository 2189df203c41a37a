//! Frames, relay-originated control messages, and the outbound union.
//!
//! Frames are opaque: the relay never parses or rewrites them, it only keeps
//! the text/binary distinction the producer used. The only structured
//! message the relay itself emits is [`ControlMessage::Status`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Transport frame type of a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// UTF-8 text frame.
    Text,
    /// Binary frame.
    Binary,
}

/// Opaque payload carried verbatim from the producer to every consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame type as received.
    pub kind: FrameKind,
    /// Raw bytes. Cloning is a reference-count bump.
    pub payload: Bytes,
}

impl Frame {
    /// A text frame.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Text,
            payload: Bytes::from(text.into()),
        }
    }

    /// A binary frame.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self {
            kind: FrameKind::Binary,
            payload: payload.into(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Message shown to viewers while a producer is connected.
pub const STREAMING_MESSAGE: &str = "Camera is streaming";
/// Message shown to viewers while no producer is connected.
pub const WAITING_MESSAGE: &str = "Waiting for camera...";

/// Producer presence as seen by a consumer at registration time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Whether a producer occupied the slot.
    pub connected: bool,
    /// Human-readable description.
    pub message: String,
}

impl StatusMessage {
    /// Status for the given producer presence.
    pub fn for_presence(connected: bool) -> Self {
        let message = if connected {
            STREAMING_MESSAGE
        } else {
            WAITING_MESSAGE
        };
        Self {
            connected,
            message: message.into(),
        }
    }
}

/// Structured messages originated by the relay.
///
/// Serialized with an internal `type` tag:
/// `{"type":"status","connected":true,"message":"Camera is streaming"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// One-shot producer presence notice.
    Status(StatusMessage),
}

impl ControlMessage {
    /// Encode as a JSON string for a text frame.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Everything that can be queued towards a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    /// A forwarded producer frame.
    Frame(Frame),
    /// A relay-originated control message.
    Control(ControlMessage),
}

impl OutboundMessage {
    /// Shorthand for a status control message.
    pub fn status(connected: bool) -> Self {
        Self::Control(ControlMessage::Status(StatusMessage::for_presence(connected)))
    }
}

impl From<Frame> for OutboundMessage {
    fn from(frame: Frame) -> Self {
        Self::Frame(frame)
    }
}
