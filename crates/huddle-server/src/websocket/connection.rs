//! Outbound half of one chat connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use huddle_core::{ConnectionId, GroupId, User};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A connected client as seen by the broker.
///
/// Bound to exactly one user and one group for its whole lifetime;
/// reconnecting to another group means a new connection.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// The authenticated user behind this link.
    pub user: User,
    /// The only group this connection is subscribed to.
    pub group_id: GroupId,
    tx: mpsc::Sender<Arc<String>>,
    connected_at: Instant,
    dropped_messages: AtomicU64,
    evicted: CancellationToken,
}

impl ClientConnection {
    /// Create a connection whose frames are drained from the other end of `tx`.
    pub fn new(id: ConnectionId, user: User, group_id: GroupId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            user,
            group_id,
            tx,
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
            evicted: CancellationToken::new(),
        }
    }

    /// Queue a text frame for the client without waiting.
    ///
    /// Returns `false` if the queue is full or the writer is gone, and
    /// increments the dropped message counter.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Signal the transport that the broker gave up on this client.
    pub fn evict(&self) {
        self.evicted.cancel();
    }

    /// Whether [`ClientConnection::evict`] has been called.
    pub fn is_evicted(&self) -> bool {
        self.evicted.is_cancelled()
    }

    /// Resolves once the connection is evicted.
    pub fn evicted(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.evicted.cancelled()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("user_id", &self.user.id)
            .field("group_id", &self.group_id)
            .field("dropped", &self.drop_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use huddle_core::UserId;

    pub(crate) fn user(id: i64, name: &str) -> User {
        User {
            id: UserId(id),
            username: name.into(),
        }
    }

    pub(crate) fn connection(
        id: &str,
        group: i64,
        capacity: usize,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = ClientConnection::new(ConnectionId::from(id), user(1, "A"), GroupId(group), tx);
        (Arc::new(conn), rx)
    }
}
