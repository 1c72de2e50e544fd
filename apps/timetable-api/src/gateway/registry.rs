//! Registry of live subscriber connections.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

/// Identity of a live connection (`ws_` prefixed ULID).
pub type ConnectionId = String;

/// Why a frame could not be delivered. Any variant means the connection is dead.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("send timed out")]
    TimedOut,
}

/// A live subscriber channel that can receive pushed text frames.
#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> &str;

    /// Deliver one text frame. Awaiting this is a suspension point.
    async fn send_text(&self, text: &str) -> Result<(), ConnectionError>;
}

/// Owns the set of open connections. Everything else goes through
/// `register` / `unregister` / `snapshot`.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<dyn Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Add a connection. Registering an id that is already present replaces
    /// the entry, so a handle is never delivered to twice.
    pub fn register(&self, connection: Arc<dyn Connection>) {
        let id = connection.id().to_string();
        self.connections.insert(id.clone(), connection);
        tracing::info!(connection_id = %id, count = self.count(), "subscriber connected");
    }

    /// Remove a connection if present. Returns whether anything was removed;
    /// the broadcast path and the disconnect handler may both call this.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.connections.remove(id).is_some();
        if removed {
            tracing::info!(connection_id = %id, count = self.count(), "subscriber disconnected");
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Connections registered at this instant. The returned handles stay
    /// valid even if they are unregistered afterwards.
    pub fn snapshot(&self) -> Vec<Arc<dyn Connection>> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use parking_lot::Mutex;

    /// In-memory connection that records frames and can be told to fail.
    pub(crate) struct FakeConnection {
        id: String,
        fail: bool,
        pub(crate) received: Mutex<Vec<String>>,
    }

    impl FakeConnection {
        pub(crate) fn healthy(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                fail: false,
                received: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn broken(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                fail: true,
                received: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn frames(&self) -> Vec<String> {
            self.received.lock().clone()
        }
    }

    #[async_trait]
    impl Connection for FakeConnection {
        fn id(&self) -> &str {
            &self.id
        }

        async fn send_text(&self, text: &str) -> Result<(), ConnectionError> {
            if self.fail {
                return Err(ConnectionError::Closed);
            }
            self.received.lock().push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn register_and_count() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.count(), 0);

        registry.register(FakeConnection::healthy("ws_a"));
        registry.register(FakeConnection::healthy("ws_b"));
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn duplicate_registration_keeps_one_entry() {
        let registry = ConnectionRegistry::new();
        let conn = FakeConnection::healthy("ws_a");

        registry.register(conn.clone());
        registry.register(conn);
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn unregister_absent_is_noop() {
        let registry = ConnectionRegistry::new();
        registry.register(FakeConnection::healthy("ws_a"));

        assert!(registry.unregister("ws_a"));
        assert!(!registry.unregister("ws_a"));
        assert!(!registry.unregister("ws_never_seen"));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn snapshot_is_detached_from_later_changes() {
        let registry = ConnectionRegistry::new();
        registry.register(FakeConnection::healthy("ws_a"));
        registry.register(FakeConnection::healthy("ws_b"));

        let snapshot = registry.snapshot();
        registry.unregister("ws_a");

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.count(), 1);
    }
}
