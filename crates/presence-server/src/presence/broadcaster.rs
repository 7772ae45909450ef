//! Roster broadcaster.
//!
//! Sends the full roster (never a diff) to every open connection after each
//! membership change.

use super::outbound::OutboundTable;
use super::registry::ConnectionRegistry;
use presence_core::{RosterEntry, ServerEvent};
use std::sync::Arc;
use tracing::debug;

/// Fans the current roster out to all open connections.
pub struct PresenceBroadcaster {
    registry: Arc<ConnectionRegistry>,
    outbound: Arc<OutboundTable>,
}

impl PresenceBroadcaster {
    /// Create a broadcaster over a registry and the outbound queues.
    pub fn new(registry: Arc<ConnectionRegistry>, outbound: Arc<OutboundTable>) -> Self {
        Self { registry, outbound }
    }

    /// Snapshot the registry as wire roster entries.
    pub async fn roster(&self) -> Vec<RosterEntry> {
        self.registry
            .list()
            .await
            .into_iter()
            .map(|r| RosterEntry {
                user_id: r.user_id,
                connection_id: r.connection_id,
            })
            .collect()
    }

    /// Send a `getUsers` roster to every open connection, including the one
    /// whose change triggered it. Returns the number of queues reached.
    pub async fn broadcast_roster(&self) -> usize {
        let roster = self.roster().await;
        let size = roster.len();
        let reached = self.outbound.fan_out(&ServerEvent::GetUsers(roster)).await;
        debug!(roster_size = size, reached, "roster broadcast");
        reached
    }
}
