//! Backend pool management.
//!
//! # Responsibilities
//! - Own the canonical, insertion-ordered list of backends
//! - Hand out copy-on-read snapshots for strategies, health checks and reporting

use std::sync::{Arc, PoisonError, RwLock};

use crate::load_balancer::backend::{Backend, BackendSnapshot};

/// Thread-safe registry of all known backends.
///
/// Backends are appended and never removed. Duplicate addresses are
/// kept as independent entries.
#[derive(Debug, Default)]
pub struct ServerPool {
    servers: RwLock<Vec<Arc<Backend>>>,
}

impl ServerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from an initial set of backends, preserving order.
    pub fn from_backends(backends: impl IntoIterator<Item = Backend>) -> Self {
        Self {
            servers: RwLock::new(backends.into_iter().map(Arc::new).collect()),
        }
    }

    /// Append a backend.
    pub fn add_server(&self, backend: Backend) -> Arc<Backend> {
        let backend = Arc::new(backend);
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(backend.clone());
        tracing::info!(address = %backend.address(), weight = backend.weight(), "Backend added to pool");
        backend
    }

    /// Snapshot of the backend list in registration order.
    ///
    /// The list itself is copied, so later appends never disturb a caller
    /// iterating the result. The backends are shared, not deep-copied.
    pub fn get_servers(&self) -> Vec<Arc<Backend>> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.servers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if any registered backend has this address.
    pub fn contains(&self, address: &str) -> bool {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|b| b.address() == address)
    }

    /// Serializable metrics of every backend, in pool order.
    pub fn snapshots(&self) -> Vec<BackendSnapshot> {
        self.get_servers().iter().map(|b| b.snapshot()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_preserves_order_and_duplicates() {
        let pool = ServerPool::new();
        pool.add_server(Backend::new("a:1", 1));
        pool.add_server(Backend::new("b:1", 1));
        pool.add_server(Backend::new("a:1", 2));

        let servers = pool.get_servers();
        let addrs: Vec<_> = servers.iter().map(|b| b.address()).collect();
        assert_eq!(addrs, vec!["a:1", "b:1", "a:1"]);
        assert!(pool.contains("b:1"));
        assert!(!pool.contains("c:1"));
    }

    #[test]
    fn test_snapshot_is_stable_across_appends() {
        let pool = ServerPool::from_backends([Backend::new("a:1", 1)]);
        let snapshot = pool.get_servers();
        pool.add_server(Backend::new("b:1", 1));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_snapshot_shares_backends() {
        let pool = ServerPool::from_backends([Backend::new("a:1", 1)]);
        let first = pool.get_servers();
        first[0].inc_connections();
        assert_eq!(pool.get_servers()[0].active_connections(), 1);
        assert_eq!(pool.snapshots()[0].active_conns, 1);
    }
}
