//! Connection registry: maps user identities to live connections.
//!
//! A user maps to at most one connection and a connection to at most one
//! user. All operations go through a single lock, so `get` and `list` never
//! observe a half-applied `add` or `remove`.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

/// A registered (identified) connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    /// Stable user identity announced by the client.
    pub user_id: String,
    /// Opaque identifier of the physical connection.
    pub connection_id: String,
    /// When the identity announcement was accepted.
    pub connected_at: Instant,
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Records keyed by insertion sequence, so iteration is registration order.
    records: BTreeMap<u64, ConnectionRecord>,
    by_user: HashMap<String, u64>,
    by_connection: HashMap<String, u64>,
    next_seq: u64,
}

impl RegistryState {
    fn insert(&mut self, user_id: &str, connection_id: &str) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.insert(
            seq,
            ConnectionRecord {
                user_id: user_id.to_string(),
                connection_id: connection_id.to_string(),
                connected_at: Instant::now(),
            },
        );
        self.by_user.insert(user_id.to_string(), seq);
        self.by_connection.insert(connection_id.to_string(), seq);
    }

    fn remove_seq(&mut self, seq: u64) -> Option<ConnectionRecord> {
        let record = self.records.remove(&seq)?;
        self.by_user.remove(&record.user_id);
        self.by_connection.remove(&record.connection_id);
        Some(record)
    }
}

/// In-memory registry of identified connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection_id` as the connection of `user_id`.
    ///
    /// Returns `false` without touching the existing mapping if the user is
    /// already registered (first registration wins), or if the connection is
    /// already bound to another user.
    pub async fn add(&self, user_id: &str, connection_id: &str) -> bool {
        let mut state = self.state.write().await;
        if state.by_user.contains_key(user_id) || state.by_connection.contains_key(connection_id) {
            debug!(user_id = %user_id, connection_id = %connection_id, "registration ignored, already present");
            return false;
        }
        state.insert(user_id, connection_id);
        true
    }

    /// Bind `user_id` to `connection_id`, evicting any existing record for
    /// that user in the same critical section. Returns the evicted record.
    ///
    /// A connection that is already registered is left untouched and
    /// `None` is returned.
    pub async fn replace(&self, user_id: &str, connection_id: &str) -> Option<ConnectionRecord> {
        let mut state = self.state.write().await;
        if state.by_connection.contains_key(connection_id) {
            debug!(user_id = %user_id, connection_id = %connection_id, "replace ignored, connection already registered");
            return None;
        }
        let evicted = match state.by_user.get(user_id).copied() {
            Some(seq) => state.remove_seq(seq),
            None => None,
        };
        state.insert(user_id, connection_id);
        evicted
    }

    /// Remove the record owned by `connection_id`, whatever its user.
    ///
    /// Unknown connection ids are a no-op and return `None`.
    pub async fn remove(&self, connection_id: &str) -> Option<ConnectionRecord> {
        let mut state = self.state.write().await;
        let seq = state.by_connection.get(connection_id).copied()?;
        state.remove_seq(seq)
    }

    /// Connection id currently registered for `user_id`.
    pub async fn get(&self, user_id: &str) -> Option<String> {
        let state = self.state.read().await;
        let seq = state.by_user.get(user_id)?;
        state.records.get(seq).map(|r| r.connection_id.clone())
    }

    /// User id currently bound to `connection_id`.
    pub async fn lookup(&self, connection_id: &str) -> Option<String> {
        let state = self.state.read().await;
        let seq = state.by_connection.get(connection_id)?;
        state.records.get(seq).map(|r| r.user_id.clone())
    }

    /// Point-in-time snapshot of all records, in registration order.
    pub async fn list(&self) -> Vec<ConnectionRecord> {
        let state = self.state.read().await;
        state.records.values().cloned().collect()
    }

    /// Number of registered users.
    pub async fn count(&self) -> usize {
        self.state.read().await.records.len()
    }
}
