//! The connection registry: the authoritative set of deliverable connections.
//!
//! A plain `HashMap` behind a `parking_lot::Mutex`. Every insert, remove, and
//! snapshot is one short critical section with no `.await` inside, so a slow
//! peer can never hold the lock. Broadcast iterates a snapshot taken under
//! the lock and writes after releasing it, which is what lets a write
//! failure remove its own entry mid-iteration without deadlocking.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::gauge;
use parking_lot::Mutex;
use relay_core::{ConnectionId, RelayError, Result};
use tracing::debug;

use crate::metrics::RELAY_CONNECTIONS_ACTIVE;
use crate::transport::Connection;

/// Set of live connections keyed by [`ConnectionId`].
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Arc<dyn Connection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Add a connection (idempotent upsert).
    ///
    /// Registering an ID that is already present replaces the handle and
    /// leaves the membership count unchanged. Returns `true` when the
    /// connection was not previously registered.
    pub fn register(&self, connection: Arc<dyn Connection>) -> bool {
        let id = connection.id().clone();
        let (is_new, len) = {
            let mut conns = self.connections.lock();
            let is_new = conns.insert(id.clone(), connection).is_none();
            (is_new, conns.len())
        };
        if is_new {
            record_active(len);
        } else {
            debug!(conn_id = %id, "connection re-registered");
        }
        is_new
    }

    /// Add a connection, failing if its ID is already registered.
    pub fn try_register(&self, connection: Arc<dyn Connection>) -> Result<()> {
        let id = connection.id().clone();
        let len = {
            let mut conns = self.connections.lock();
            if conns.contains_key(&id) {
                return Err(RelayError::DuplicateConnection(id));
            }
            let _ = conns.insert(id, connection);
            conns.len()
        };
        record_active(len);
        Ok(())
    }

    /// Remove a connection. Removing an absent ID is a no-op.
    ///
    /// Returns the removed handle so the caller can release it.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<dyn Connection>> {
        let (removed, len) = {
            let mut conns = self.connections.lock();
            let removed = conns.remove(id);
            (removed, conns.len())
        };
        if removed.is_some() {
            record_active(len);
        }
        removed
    }

    /// Copy of the current members, taken in one critical section.
    pub fn snapshot(&self) -> Vec<Arc<dyn Connection>> {
        self.connections.lock().values().cloned().collect()
    }

    /// Run `f` on every member of a snapshot, one at a time.
    ///
    /// The lock is released before `f` runs, so `f` may await and may call
    /// [`Self::remove`] (including on the connection it was handed).
    /// Returns the number of members visited.
    pub async fn for_each<F, Fut>(&self, mut f: F) -> usize
    where
        F: FnMut(Arc<dyn Connection>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let members = self.snapshot();
        let visited = members.len();
        for conn in members {
            f(conn).await;
        }
        visited
    }

    /// Whether a connection with this ID is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.lock().contains_key(id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_active(len: usize) {
    gauge!(RELAY_CONNECTIONS_ACTIVE).set(len as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnection;
    use assert_matches::assert_matches;

    fn conn(id: &str) -> Arc<dyn Connection> {
        MockConnection::new(id)
    }

    #[test]
    fn register_and_len() {
        let registry = ConnectionRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.register(conn("a")));
        assert!(registry.register(conn("b")));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn register_is_idempotent_upsert() {
        let registry = ConnectionRegistry::new();
        let a = conn("a");
        assert!(registry.register(a.clone()));
        assert!(!registry.register(a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn try_register_rejects_duplicates() {
        let registry = ConnectionRegistry::new();
        registry.try_register(conn("a")).unwrap();
        let err = registry.try_register(conn("a")).unwrap_err();
        assert_matches!(err, RelayError::DuplicateConnection(id) if id.as_str() == "a");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_returns_handle() {
        let registry = ConnectionRegistry::new();
        let _ = registry.register(conn("a"));
        let removed = registry.remove(&ConnectionId::from_string("a"));
        assert_eq!(removed.unwrap().id().as_str(), "a");
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_absent_is_noop() {
        let registry = ConnectionRegistry::new();
        let _ = registry.register(conn("a"));
        assert!(registry.remove(&ConnectionId::from_string("zzz")).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn double_remove_equals_single_remove() {
        let registry = ConnectionRegistry::new();
        let _ = registry.register(conn("a"));
        let _ = registry.register(conn("b"));
        let id = ConnectionId::from_string("a");
        assert!(registry.remove(&id).is_some());
        assert!(registry.remove(&id).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&ConnectionId::from_string("b")));
    }

    #[tokio::test]
    async fn for_each_tolerates_self_removal() {
        let registry = ConnectionRegistry::new();
        for id in ["a", "b", "c"] {
            let _ = registry.register(conn(id));
        }
        let registry = &registry;
        let visited = registry
            .for_each(move |c| async move {
                tokio::task::yield_now().await;
                let _ = registry.remove(c.id());
            })
            .await;
        assert_eq!(visited, 3);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn for_each_skips_members_added_mid_walk() {
        let registry = ConnectionRegistry::new();
        let _ = registry.register(conn("a"));
        let registry = &registry;
        let visited = registry
            .for_each(move |_| async move {
                let _ = registry.register(conn("late"));
            })
            .await;
        assert_eq!(visited, 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn snapshot_is_detached_from_later_mutation() {
        let registry = ConnectionRegistry::new();
        let _ = registry.register(conn("a"));
        let snap = registry.snapshot();
        let _ = registry.register(conn("b"));
        let _ = registry.remove(&ConnectionId::from_string("a"));
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].id().as_str(), "a");
    }

    #[test]
    fn concurrent_register_remove_snapshot() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..200 {
                    let id = format!("t{t}_{i}");
                    let _ = registry.register(conn(&id));
                    let snap = registry.snapshot();
                    let mut ids: Vec<_> = snap.iter().map(|c| c.id().clone()).collect();
                    let before = ids.len();
                    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
                    ids.dedup();
                    assert_eq!(before, ids.len(), "snapshot exposed a duplicate");
                    let _ = registry.remove(&ConnectionId::from_string(id));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(registry.is_empty());
    }

    mod proptests {
        use std::collections::HashSet;

        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Register(u8),
            Remove(u8),
            Snapshot,
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..8).prop_map(Op::Register),
                (0u8..8).prop_map(Op::Remove),
                Just(Op::Snapshot),
            ]
        }

        proptest! {
            #[test]
            fn registry_matches_set_model(ops in proptest::collection::vec(op(), 0..64)) {
                let registry = ConnectionRegistry::new();
                let mut model: HashSet<u8> = HashSet::new();
                for op in ops {
                    match op {
                        Op::Register(n) => {
                            let is_new = registry.register(conn(&format!("c{n}")));
                            prop_assert_eq!(is_new, model.insert(n));
                        }
                        Op::Remove(n) => {
                            let removed = registry.remove(&ConnectionId::from_string(format!("c{n}")));
                            prop_assert_eq!(removed.is_some(), model.remove(&n));
                        }
                        Op::Snapshot => {
                            let ids: HashSet<String> = registry
                                .snapshot()
                                .iter()
                                .map(|c| c.id().to_string())
                                .collect();
                            let expected: HashSet<String> =
                                model.iter().map(|n| format!("c{n}")).collect();
                            prop_assert_eq!(ids, expected);
                        }
                    }
                    prop_assert_eq!(registry.len(), model.len());
                }
            }

            #[test]
            fn remove_is_idempotent(present in any::<bool>(), n in 0u8..8) {
                let registry = ConnectionRegistry::new();
                if present {
                    let _ = registry.register(conn(&format!("c{n}")));
                }
                let id = ConnectionId::from_string(format!("c{n}"));
                let _ = registry.remove(&id);
                let after_once = registry.len();
                let _ = registry.remove(&id);
                prop_assert_eq!(registry.len(), after_once);
                prop_assert_eq!(after_once, 0);
            }
        }
    }
}
