//! The single producer slot.

use std::sync::Arc;

use camrelay_core::ConnectionId;

use crate::connection::Connection;

/// Holds at most one current producer.
///
/// Replacing the occupant does not close the previous connection; it only
/// stops being the forwarding source.
#[derive(Debug, Default)]
pub struct ProducerSlot {
    current: Option<Arc<Connection>>,
}

impl ProducerSlot {
    /// An empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `conn` unconditionally, returning the previous occupant.
    pub fn set_current(&mut self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        self.current.replace(conn)
    }

    /// Empty the slot only if `id` is the current occupant.
    ///
    /// Returns whether the slot was cleared.
    pub fn clear_if_current(&mut self, id: &ConnectionId) -> bool {
        if self.is_current(id) {
            self.current = None;
            true
        } else {
            false
        }
    }

    /// Whether `id` is the current occupant.
    pub fn is_current(&self, id: &ConnectionId) -> bool {
        self.current.as_ref().is_some_and(|c| &c.id == id)
    }

    /// Whether any producer occupies the slot.
    ///
    /// A producer whose transport died without a close event yet still
    /// counts as present.
    pub fn is_occupied(&self) -> bool {
        self.current.is_some()
    }

    /// Id of the current occupant.
    pub fn current_id(&self) -> Option<&ConnectionId> {
        self.current.as_ref().map(|c| &c.id)
    }
}
