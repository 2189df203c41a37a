//! Registry of live consumer connections.

use std::collections::HashMap;
use std::sync::Arc;

use camrelay_core::ConnectionId;

use crate::connection::Connection;

/// Unordered set of consumers keyed by connection identity. Unbounded.
#[derive(Debug, Default)]
pub struct ConsumerRegistry {
    consumers: HashMap<ConnectionId, Arc<Connection>>,
}

impl ConsumerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a consumer. Returns `false` if the id was already present.
    pub fn add(&mut self, conn: Arc<Connection>) -> bool {
        self.consumers.insert(conn.id.clone(), conn).is_none()
    }

    /// Remove a consumer by id. Returns whether it was present.
    pub fn remove(&mut self, id: &ConnectionId) -> bool {
        self.consumers.remove(id).is_some()
    }

    /// Visit every registered consumer.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<Connection>)) {
        for conn in self.consumers.values() {
            f(conn);
        }
    }

    /// Number of registered consumers.
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    /// Whether no consumer is registered.
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use camrelay_core::Role;
    use proptest::prelude::*;

    use super::*;

    fn consumer() -> Arc<Connection> {
        Connection::open(Role::Consumer, 1).0
    }

    #[test]
    fn add_and_remove() {
        let mut registry = ConsumerRegistry::new();
        let c = consumer();
        assert!(registry.add(c.clone()));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(&c.id));
        assert!(registry.is_empty());
    }

    #[test]
    fn add_same_connection_twice() {
        let mut registry = ConsumerRegistry::new();
        let c = consumer();
        assert!(registry.add(c.clone()));
        assert!(!registry.add(c));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut registry = ConsumerRegistry::new();
        let _ = registry.add(consumer());
        assert!(!registry.remove(&ConnectionId::new()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn for_each_visits_all() {
        let mut registry = ConsumerRegistry::new();
        for _ in 0..4 {
            let _ = registry.add(consumer());
        }
        let mut visited = 0;
        registry.for_each(|_| visited += 1);
        assert_eq!(visited, 4);
    }

    proptest! {
        #[test]
        fn len_matches_model(ops in proptest::collection::vec((any::<bool>(), 0usize..8), 0..64)) {
            let pool: Vec<Arc<Connection>> = (0..8).map(|_| consumer()).collect();
            let mut registry = ConsumerRegistry::new();
            let mut model = std::collections::HashSet::new();

            for (insert, idx) in ops {
                let conn = &pool[idx];
                if insert {
                    let _ = registry.add(conn.clone());
                    let _ = model.insert(conn.id.clone());
                } else {
                    let _ = registry.remove(&conn.id);
                    let _ = model.remove(&conn.id);
                }
                prop_assert_eq!(registry.len(), model.len());
            }
        }
    }
}
