//! Delivers server messages to every registered subscriber.
//!
//! Each pass works from a registry snapshot, so connections registered while
//! a broadcast is in flight receive only later messages. Delivery is
//! best-effort: a connection whose send fails or does not finish within
//! [`SEND_TIMEOUT`] is removed and never retried.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use super::events::ServerMessage;
use super::registry::{Connection, ConnectionError, ConnectionRegistry};

/// Longest a single frame may take to reach a subscriber before the
/// connection is treated as dead.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

async fn send_with_timeout(
    conn: &Arc<dyn Connection>,
    text: &str,
) -> Result<(), ConnectionError> {
    match tokio::time::timeout(SEND_TIMEOUT, conn.send_text(text)).await {
        Ok(result) => result,
        Err(_) => Err(ConnectionError::TimedOut),
    }
}

/// Outcome of one broadcast pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub pruned: usize,
}

/// Cloneable handle to the registry. Store in AppState.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Send `message` to every connection registered at call time.
    ///
    /// Sends run concurrently. Failed or stalled connections are
    /// unregistered. This never returns an error to the caller.
    pub async fn broadcast(&self, message: &ServerMessage) -> BroadcastReport {
        let targets = self.registry.snapshot();
        if targets.is_empty() {
            return BroadcastReport::default();
        }

        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize broadcast message");
                return BroadcastReport::default();
            }
        };

        let results = join_all(targets.iter().map(|conn| {
            let text = text.as_str();
            async move { (conn, send_with_timeout(conn, text).await) }
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (conn, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::debug!(connection_id = %conn.id(), error = %e, "dropping dead subscriber");
                    self.registry.unregister(conn.id());
                    report.pruned += 1;
                }
            }
        }

        tracing::debug!(
            delivered = report.delivered,
            pruned = report.pruned,
            "broadcast complete"
        );
        report
    }

    /// Send `message` to a single connection. A failed send unregisters it.
    pub async fn send_direct(&self, message: &ServerMessage, conn: &Arc<dyn Connection>) -> bool {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize direct message");
                return false;
            }
        };

        match send_with_timeout(conn, &text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(connection_id = %conn.id(), error = %e, "direct send failed");
                self.registry.unregister(conn.id());
                false
            }
        }
    }

    /// Broadcast in a background task so the caller is not held up by slow
    /// subscribers.
    pub fn publish(&self, message: ServerMessage) {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            broadcaster.broadcast(&message).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::events::{to_event, Mutation};
    use crate::gateway::registry::tests::FakeConnection;
    use async_trait::async_trait;
    use crate::models::schedule::tests::sample_response;

    fn broadcaster() -> Broadcaster {
        Broadcaster::new(Arc::new(ConnectionRegistry::new()))
    }

    #[tokio::test]
    async fn delivers_once_to_each_healthy_connection() {
        let b = broadcaster();
        let x = FakeConnection::healthy("ws_x");
        let y = FakeConnection::healthy("ws_y");
        b.registry().register(x.clone());
        b.registry().register(y.clone());

        let report = b.broadcast(&ServerMessage::Pong).await;

        assert_eq!(report, BroadcastReport { delivered: 2, pruned: 0 });
        assert_eq!(x.frames(), vec![r#"{"type":"pong"}"#.to_string()]);
        assert_eq!(y.frames().len(), 1);
    }

    #[tokio::test]
    async fn failed_connection_is_pruned_and_others_still_receive() {
        let b = broadcaster();
        let x = FakeConnection::healthy("ws_x");
        let y = FakeConnection::broken("ws_y");
        let z = FakeConnection::healthy("ws_z");
        b.registry().register(x.clone());
        b.registry().register(y);
        b.registry().register(z.clone());

        let event = to_event(Mutation::Created(sample_response(1, 10, 1)));
        let report = b.broadcast(&event).await;

        assert_eq!(report, BroadcastReport { delivered: 2, pruned: 1 });
        assert_eq!(b.registry().count(), 2);
        assert_eq!(x.frames().len(), 1);
        assert_eq!(z.frames().len(), 1);

        let json: serde_json::Value = serde_json::from_str(&x.frames()[0]).unwrap();
        assert_eq!(json["action"], "create");

        // Next pass only reaches the survivors.
        let report = b.broadcast(&ServerMessage::Pong).await;
        assert_eq!(report, BroadcastReport { delivered: 2, pruned: 0 });
    }

    #[tokio::test]
    async fn empty_registry_is_a_noop() {
        let b = broadcaster();
        let report = b.broadcast(&ServerMessage::Pong).await;
        assert_eq!(report, BroadcastReport::default());
        assert_eq!(b.registry().count(), 0);
    }

    #[tokio::test]
    async fn connection_registered_after_snapshot_misses_that_pass() {
        let b = broadcaster();
        let early = FakeConnection::healthy("ws_early");
        b.registry().register(early.clone());

        b.broadcast(&ServerMessage::Pong).await;
        let late = FakeConnection::healthy("ws_late");
        b.registry().register(late.clone());
        b.broadcast(&ServerMessage::Pong).await;

        assert_eq!(early.frames().len(), 2);
        assert_eq!(late.frames().len(), 1);
    }

    #[tokio::test]
    async fn send_direct_prunes_on_failure() {
        let b = broadcaster();
        let ok: Arc<dyn Connection> = FakeConnection::healthy("ws_ok");
        let dead: Arc<dyn Connection> = FakeConnection::broken("ws_dead");
        b.registry().register(ok.clone());
        b.registry().register(dead.clone());

        assert!(b.send_direct(&ServerMessage::connected(2), &ok).await);
        assert!(!b.send_direct(&ServerMessage::Pong, &dead).await);
        assert_eq!(b.registry().count(), 1);
    }

    /// Accepts no frames: every send waits forever.
    struct StalledConnection {
        id: String,
    }

    #[async_trait]
    impl Connection for StalledConnection {
        fn id(&self) -> &str {
            &self.id
        }

        async fn send_text(&self, _text: &str) -> Result<(), ConnectionError> {
            std::future::pending().await
        }
    }

    fn stalled(id: &str) -> Arc<dyn Connection> {
        Arc::new(StalledConnection { id: id.to_string() })
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_connection_times_out_and_is_pruned() {
        let b = broadcaster();
        let healthy = FakeConnection::healthy("ws_ok");
        b.registry().register(healthy.clone());
        b.registry().register(stalled("ws_stuck"));

        let report = tokio::time::timeout(SEND_TIMEOUT * 2, b.broadcast(&ServerMessage::Pong))
            .await
            .expect("broadcast should finish once the send timeout fires");

        assert_eq!(report, BroadcastReport { delivered: 1, pruned: 1 });
        assert_eq!(healthy.frames().len(), 1);
        assert_eq!(b.registry().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_direct_gives_up_on_stalled_connection() {
        let b = broadcaster();
        let conn = stalled("ws_stuck");
        b.registry().register(conn.clone());

        assert!(!b.send_direct(&ServerMessage::Pong, &conn).await);
        assert_eq!(b.registry().count(), 0);
    }

    #[tokio::test]
    async fn publish_delivers_in_background() {
        let b = broadcaster();
        let x = FakeConnection::healthy("ws_x");
        b.registry().register(x.clone());

        b.publish(ServerMessage::Pong);

        for _ in 0..50 {
            if !x.frames().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(x.frames().len(), 1);
    }
}
