//! Connection gateway: owns every connection's lifecycle and is the only
//! component that mutates the registry.
//!
//! # Data Flow
//!
//! ```text
//! accept            → OutboundTable::attach            (state: Connecting)
//! addUser           → ConnectionRegistry::add/replace  (state: Identified)
//!                     → PresenceBroadcaster::broadcast_roster   (if membership changed)
//! sendMessage       → MessageRouter::route             (Identified only)
//! disconnect/close  → OutboundTable::detach
//!                     → ConnectionRegistry::remove     (state: Closed)
//!                     → PresenceBroadcaster::broadcast_roster   (if a record was removed)
//! ```
//!
//! A membership change and its roster broadcast run under one commit lock,
//! so clients see rosters in the order the registry changed.

pub mod connection;

pub use connection::{CloseReason, ConnectionHandle, ConnectionState};

use crate::config::DuplicateIdentityPolicy;
use crate::presence::{
    ConnectionRegistry, MessageRouter, OutboundTable, PresenceBroadcaster, RouteOutcome,
};
use connection::generate_connection_id;
use presence_core::{ClientEvent, ServerEvent};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

/// What the session loop should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The connection has been closed by the gateway; stop reading.
    Closed,
}

/// Owns connection lifecycles and wires registry, broadcaster and router.
pub struct ConnectionGateway {
    registry: Arc<ConnectionRegistry>,
    outbound: Arc<OutboundTable>,
    broadcaster: PresenceBroadcaster,
    router: MessageRouter,
    duplicate_policy: DuplicateIdentityPolicy,
    /// Serializes membership change + roster broadcast.
    commit: Mutex<()>,
}

impl ConnectionGateway {
    /// Build a gateway with fresh registry and outbound queues.
    pub fn new(
        outbound_queue: usize,
        duplicate_policy: DuplicateIdentityPolicy,
        enforce_sender_identity: bool,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let outbound = Arc::new(OutboundTable::new(outbound_queue));
        let broadcaster = PresenceBroadcaster::new(registry.clone(), outbound.clone());
        let router = MessageRouter::new(registry.clone(), outbound.clone(), enforce_sender_identity);
        Self {
            registry,
            outbound,
            broadcaster,
            router,
            duplicate_policy,
            commit: Mutex::new(()),
        }
    }

    /// Accept a new physical connection in the `Connecting` state.
    ///
    /// Returns the handle and the queue of events to write to the client.
    pub async fn accept(&self) -> (ConnectionHandle, mpsc::Receiver<ServerEvent>) {
        let handle = ConnectionHandle::new(generate_connection_id());
        let rx = self.outbound.attach(handle.id()).await;
        let open = self.outbound.count().await;
        debug!(connection_id = %handle.id(), open, "connection accepted");
        (handle, rx)
    }

    /// Apply one client event to a connection.
    pub async fn handle(&self, conn: &mut ConnectionHandle, event: ClientEvent) -> Flow {
        if conn.is_closed() {
            debug!(connection_id = %conn.id(), event = event.name(), "event after close ignored");
            return Flow::Closed;
        }

        match event {
            ClientEvent::AddUser(p) => {
                self.identify(conn, p.user_id).await;
                Flow::Continue
            }
            ClientEvent::SendMessage(p) => {
                if conn.user_id().is_none() {
                    debug!(connection_id = %conn.id(), "sendMessage before addUser ignored");
                    return Flow::Continue;
                }
                let outcome = self.router.route(conn.id(), &p).await;
                if outcome != RouteOutcome::Delivered {
                    debug!(connection_id = %conn.id(), ?outcome, "envelope not delivered");
                }
                Flow::Continue
            }
            ClientEvent::Disconnect => {
                self.close(conn, CloseReason::Logout).await;
                Flow::Closed
            }
        }
    }

    /// `Connecting -> Identified`. Further announcements on the same
    /// connection are ignored.
    async fn identify(&self, conn: &mut ConnectionHandle, user_id: String) {
        if let ConnectionState::Identified { user_id: current } = conn.state() {
            debug!(
                connection_id = %conn.id(),
                current = %current,
                requested = %user_id,
                "connection already identified, announcement ignored"
            );
            return;
        }

        let _commit = self.commit.lock().await;
        let changed = match self.duplicate_policy {
            DuplicateIdentityPolicy::FirstWins => {
                let added = self.registry.add(&user_id, conn.id()).await;
                if !added {
                    info!(
                        user_id = %user_id,
                        connection_id = %conn.id(),
                        "duplicate identity, keeping first registration"
                    );
                }
                added
            }
            DuplicateIdentityPolicy::LastWins => {
                if let Some(evicted) = self.registry.replace(&user_id, conn.id()).await {
                    info!(
                        user_id = %user_id,
                        evicted = %evicted.connection_id,
                        connection_id = %conn.id(),
                        "duplicate identity, replacing previous registration"
                    );
                }
                true
            }
        };
        conn.state = ConnectionState::Identified {
            user_id: user_id.clone(),
        };

        if changed {
            let online = self.registry.count().await;
            info!(user_id = %user_id, connection_id = %conn.id(), online, "user registered");
            self.broadcaster.broadcast_roster().await;
        }
    }

    /// Move a connection to `Closed` from any state. Idempotent.
    pub async fn close(&self, conn: &mut ConnectionHandle, reason: CloseReason) {
        let previous = std::mem::replace(&mut conn.state, ConnectionState::Closed);
        if previous == ConnectionState::Closed {
            return;
        }

        // A closing connection never receives the roster for its own departure.
        self.outbound.detach(conn.id()).await;

        if let ConnectionState::Identified { user_id } = previous {
            let _commit = self.commit.lock().await;
            if let Some(record) = self.registry.remove(conn.id()).await {
                info!(
                    user_id = %record.user_id,
                    connection_id = %conn.id(),
                    connected_secs = record.connected_at.elapsed().as_secs(),
                    %reason,
                    "user unregistered"
                );
                self.broadcaster.broadcast_roster().await;
                return;
            }
            debug!(user_id = %user_id, connection_id = %conn.id(), %reason, "unregistered identity closed");
            return;
        }

        debug!(connection_id = %conn.id(), %reason, "connection closed before identifying");
    }
}
