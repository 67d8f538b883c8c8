//! Connection registry — session-keyed sets of live connections.
//!
//! Each joined connection gets a bounded outbound queue; the socket task
//! drains it. Broadcast is at-most-once and best-effort: a member whose
//! queue is closed or full is dropped from the set, and one broken member
//! never blocks delivery to the rest. The membership lock is held only for
//! map access, never across I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use async_trait::async_trait;
use parley_core::event::{SessionEvent, SessionNotifier};
use parley_core::session::SessionId;

/// Outbound queue depth per connection. A peer that stops draining for
/// this many events counts as dead.
const OUTBOUND_QUEUE: usize = 64;

/// Registry-local handle for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Session-keyed sets of live connections.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, HashMap<ConnectionId, mpsc::Sender<SessionEvent>>>>,
    next_id: AtomicU64,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a connection with a session. The first join creates the
    /// session's set. Returns the handle and the event receiver the
    /// socket task should drain.
    pub async fn join(
        &self,
        session_id: &SessionId,
    ) -> (ConnectionId, mpsc::Receiver<SessionEvent>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);

        let mut connections = self.connections.write().await;
        connections
            .entry(session_id.0.clone())
            .or_default()
            .insert(id, tx);

        debug!(session_id = %session_id, connection = %id, "Connection joined");
        (id, rx)
    }

    /// Remove a connection. Prunes the session entry when its set empties,
    /// so an idle registry holds nothing.
    pub async fn leave(&self, session_id: &SessionId, connection: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(members) = connections.get_mut(&session_id.0) {
            members.remove(&connection);
            if members.is_empty() {
                connections.remove(&session_id.0);
            }
        }
        debug!(session_id = %session_id, connection = %connection, "Connection left");
    }

    /// Deliver an event to every current member of a session.
    ///
    /// Never fails: a session with no members is a no-op, and members that
    /// cannot accept the event are dropped from the set.
    pub async fn broadcast(&self, session_id: &SessionId, event: SessionEvent) {
        let members: Vec<(ConnectionId, mpsc::Sender<SessionEvent>)> = {
            let connections = self.connections.read().await;
            match connections.get(&session_id.0) {
                Some(members) => members.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
                None => return,
            }
        };

        let mut dead = Vec::new();
        for (id, tx) in members {
            if tx.try_send(event.clone()).is_err() {
                warn!(session_id = %session_id, connection = %id, "Dropping unreachable connection");
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            let mut connections = self.connections.write().await;
            if let Some(members) = connections.get_mut(&session_id.0) {
                for id in dead {
                    members.remove(&id);
                }
                if members.is_empty() {
                    connections.remove(&session_id.0);
                }
            }
        }
    }

    /// Number of live connections for a session.
    pub async fn peer_count(&self, session_id: &SessionId) -> usize {
        self.connections
            .read()
            .await
            .get(&session_id.0)
            .map_or(0, HashMap::len)
    }

    /// Number of sessions with at least one live connection.
    pub async fn session_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[async_trait]
impl SessionNotifier for ConnectionRegistry {
    async fn notify(&self, session_id: &SessionId, event: SessionEvent) {
        self.broadcast(session_id, event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn typing(user: &str) -> SessionEvent {
        SessionEvent::Typing {
            user_id: user.into(),
            is_typing: true,
        }
    }

    #[tokio::test]
    async fn join_then_leave_prunes_session_entry() {
        let registry = ConnectionRegistry::new();
        let session = SessionId::from("s1");

        let (id, _rx) = registry.join(&session).await;
        assert_eq!(registry.peer_count(&session).await, 1);
        assert_eq!(registry.session_count().await, 1);

        registry.leave(&session, id).await;
        assert_eq!(registry.peer_count(&session).await, 0);
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_members() {
        let registry = ConnectionRegistry::new();
        let session = SessionId::from("s1");

        let (_a, mut rx_a) = registry.join(&session).await;
        let (b, mut rx_b) = registry.join(&session).await;

        registry.broadcast(&session, typing("u-1")).await;
        assert_eq!(rx_a.recv().await.unwrap(), typing("u-1"));
        assert_eq!(rx_b.recv().await.unwrap(), typing("u-1"));

        // after B disconnects, only A receives
        registry.leave(&session, b).await;
        registry.broadcast(&session, typing("u-2")).await;
        assert_eq!(rx_a.recv().await.unwrap(), typing("u-2"));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_empty_session_is_a_noop() {
        let registry = ConnectionRegistry::new();
        registry
            .broadcast(&SessionId::from("nobody-home"), typing("u-1"))
            .await;
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn dead_member_is_dropped_without_blocking_the_rest() {
        let registry = ConnectionRegistry::new();
        let session = SessionId::from("s1");

        let (_a, mut rx_a) = registry.join(&session).await;
        let (_b, rx_b) = registry.join(&session).await;
        drop(rx_b); // B's socket task is gone

        registry.broadcast(&session, typing("u-1")).await;
        assert_eq!(rx_a.recv().await.unwrap(), typing("u-1"));
        assert_eq!(registry.peer_count(&session).await, 1);
    }

    #[tokio::test]
    async fn events_stay_scoped_to_their_session() {
        let registry = ConnectionRegistry::new();
        let s1 = SessionId::from("s1");
        let s2 = SessionId::from("s2");

        let (_a, mut rx_a) = registry.join(&s1).await;
        let (_b, mut rx_b) = registry.join(&s2).await;

        registry
            .broadcast(
                &s1,
                SessionEvent::Message {
                    user_id: "u-1".into(),
                    content: "only s1".into(),
                    timestamp: Utc::now(),
                },
            )
            .await;

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn notifier_trait_delegates_to_broadcast() {
        let registry = ConnectionRegistry::new();
        let session = SessionId::from("s1");
        let (_a, mut rx) = registry.join(&session).await;

        let notifier: &dyn SessionNotifier = &registry;
        notifier.notify(&session, typing("u-9")).await;
        assert_eq!(rx.recv().await.unwrap(), typing("u-9"));
    }
}
