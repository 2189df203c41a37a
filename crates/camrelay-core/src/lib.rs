//! # camrelay-core
//!
//! Shared vocabulary for the camera relay.
//!
//! - **Ids**: [`ids::ConnectionId`], the identity used by the producer slot
//!   and the consumer registry
//! - **Roles**: [`role::Role`] and the handshake classifier [`role::classify`]
//! - **Messages**: [`message::Frame`] (opaque payload), [`message::ControlMessage`]
//!   (relay-originated status), [`message::OutboundMessage`] (the single send path)
//! - **Errors**: [`errors::RelayError`] and [`errors::SendError`] via `thiserror`
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `camrelay-server`.

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod message;
pub mod role;

pub use errors::{ReadyState, RelayError, Result, SendError};
pub use ids::ConnectionId;
pub use message::{ControlMessage, Frame, FrameKind, OutboundMessage, StatusMessage};
pub use role::{HandshakeInfo, ProducerSignature, Role, classify};
