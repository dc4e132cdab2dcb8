//! Group fan-out registry.
//!
//! Maps each group to the set of live connections subscribed to it. Every
//! group owns its own bucket lock, so registering, unregistering, or
//! broadcasting in one group never waits on another. The outer map is only
//! touched to find or retire a bucket.
//!
//! All operations are synchronous and idempotent so they can run from
//! `Drop` and never surface bookkeeping errors to callers.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use huddle_core::{ConnectionId, GroupId};
use metrics::{counter, gauge};
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::metrics::{WS_BROADCAST_DROPS_TOTAL, WS_SLOW_CLIENT_EVICTIONS_TOTAL, WS_SUBSCRIPTIONS_ACTIVE};

/// Default lifetime drop budget before a slow client is evicted.
pub const DEFAULT_MAX_DROPS: u64 = 100;

type Bucket = Arc<RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>>;

/// Process-wide registry of group subscriptions.
pub struct Broker {
    groups: DashMap<GroupId, Bucket>,
    active_count: AtomicUsize,
    max_drops: u64,
}

impl Broker {
    /// Create a broker that evicts clients after `max_drops` dropped frames.
    pub fn new(max_drops: u64) -> Self {
        Self {
            groups: DashMap::new(),
            active_count: AtomicUsize::new(0),
            max_drops: max_drops.max(1),
        }
    }

    /// Subscribe `connection` to `group_id`.
    ///
    /// Returns `false` if the connection was already registered there.
    pub fn register(&self, group_id: GroupId, connection: Arc<ClientConnection>) -> bool {
        // The shard guard is held across the bucket insert so a concurrent
        // `unregister` cannot retire the bucket in between.
        let bucket = self.groups.entry(group_id).or_default();
        let inserted = match bucket.value().write().entry(connection.id.clone()) {
            Entry::Vacant(slot) => {
                let _ = slot.insert(connection);
                true
            }
            Entry::Occupied(_) => false,
        };
        drop(bucket);
        if inserted {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
            gauge!(WS_SUBSCRIPTIONS_ACTIVE).increment(1.0);
        }
        inserted
    }

    /// Remove `connection_id` from `group_id`. No-op if absent.
    pub fn unregister(&self, group_id: GroupId, connection_id: &ConnectionId) -> bool {
        let Some(bucket) = self.bucket(group_id) else {
            return false;
        };
        let removed = bucket.write().remove(connection_id).is_some();
        if removed {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
            gauge!(WS_SUBSCRIPTIONS_ACTIVE).decrement(1.0);
            self.retire_if_empty(group_id);
        }
        removed
    }

    /// Deliver `frame` to every connection registered under `group_id`.
    ///
    /// Returns the number of connections that accepted the frame. Clients
    /// whose lifetime drop count reaches the budget are evicted afterwards.
    pub fn broadcast(&self, group_id: GroupId, frame: &Arc<String>) -> usize {
        let Some(bucket) = self.bucket(group_id) else {
            debug!(%group_id, "broadcast to group with no subscribers");
            return 0;
        };
        let mut delivered = 0usize;
        let mut to_evict = Vec::new();
        {
            let conns = bucket.read();
            for conn in conns.values() {
                if conn.send(Arc::clone(frame)) {
                    delivered += 1;
                    continue;
                }
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                let drops = conn.drop_count();
                if drops >= self.max_drops {
                    warn!(conn_id = %conn.id, %group_id, drops, "disconnecting slow client");
                    to_evict.push(conn.id.clone());
                } else {
                    warn!(conn_id = %conn.id, %group_id, total_drops = drops, "failed to queue frame for client");
                }
            }
            debug!(%group_id, recipients = conns.len(), delivered, "broadcast frame");
        }
        for conn_id in &to_evict {
            let evicted = bucket.write().remove(conn_id);
            if let Some(conn) = evicted {
                let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
                gauge!(WS_SUBSCRIPTIONS_ACTIVE).decrement(1.0);
                counter!(WS_SLOW_CLIENT_EVICTIONS_TOTAL).increment(1);
                conn.evict();
            }
        }
        if !to_evict.is_empty() {
            self.retire_if_empty(group_id);
        }
        delivered
    }

    /// Total registered connections across all groups.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Registered connections in one group.
    pub fn group_connection_count(&self, group_id: GroupId) -> usize {
        self.bucket(group_id).map_or(0, |b| b.read().len())
    }

    /// Groups with at least one registered connection.
    pub fn active_groups(&self) -> usize {
        self.groups.len()
    }

    /// Whether `connection_id` is registered under `group_id`.
    pub fn contains(&self, group_id: GroupId, connection_id: &ConnectionId) -> bool {
        self.bucket(group_id)
            .is_some_and(|b| b.read().contains_key(connection_id))
    }

    fn bucket(&self, group_id: GroupId) -> Option<Bucket> {
        self.groups.get(&group_id).map(|b| Arc::clone(b.value()))
    }

    fn retire_if_empty(&self, group_id: GroupId) {
        let _ = self
            .groups
            .remove_if(&group_id, |_, bucket| bucket.read().is_empty());
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DROPS)
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("groups", &self.active_groups())
            .field("connections", &self.connection_count())
            .field("max_drops", &self.max_drops)
            .finish()
    }
}
