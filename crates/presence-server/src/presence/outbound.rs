//! Per-connection outbound queues.
//!
//! Every open connection (identified or not) owns one bounded queue drained
//! by its session loop. Pushes never block: a full or closed queue drops the
//! event.

use presence_core::ServerEvent;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

/// Outbound queues keyed by connection id.
pub struct OutboundTable {
    senders: RwLock<HashMap<String, mpsc::Sender<ServerEvent>>>,
    queue_capacity: usize,
}

impl OutboundTable {
    /// Create an empty table whose queues hold `queue_capacity` events each.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Open a queue for `connection_id` and return its receiving end.
    pub async fn attach(&self, connection_id: &str) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.senders
            .write()
            .await
            .insert(connection_id.to_string(), tx);
        rx
    }

    /// Drop the queue for `connection_id`. Returns whether one existed.
    pub async fn detach(&self, connection_id: &str) -> bool {
        self.senders.write().await.remove(connection_id).is_some()
    }

    /// Queue `event` for one connection. Returns `false` if the connection is
    /// unknown or its queue cannot take the event right now.
    pub async fn send_to(&self, connection_id: &str, event: ServerEvent) -> bool {
        let senders = self.senders.read().await;
        match senders.get(connection_id) {
            Some(tx) => match tx.try_send(event) {
                Ok(()) => true,
                Err(e) => {
                    warn!(connection_id = %connection_id, error = %e, "outbound delivery dropped");
                    false
                }
            },
            None => {
                debug!(connection_id = %connection_id, "no outbound queue for connection");
                false
            }
        }
    }

    /// Queue a copy of `event` for every open connection. Returns how many
    /// queues accepted it.
    pub async fn fan_out(&self, event: &ServerEvent) -> usize {
        let senders = self.senders.read().await;
        let mut delivered = 0;
        for (connection_id, tx) in senders.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(connection_id = %connection_id, event = event.name(), error = %e, "broadcast copy dropped");
                }
            }
        }
        delivered
    }

    /// Number of open connections.
    pub async fn count(&self) -> usize {
        self.senders.read().await.len()
    }
}
