//! Per-connection state machine: `Connecting -> Identified -> Closed`.

/// Lifecycle state of one physical connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, no identity announced yet.
    Connecting,
    /// Identity announced. The registry may or may not hold an entry for it
    /// (a duplicate announcement, or one evicted by a later announcement,
    /// is identified but unregistered).
    Identified { user_id: String },
    /// Terminal.
    Closed,
}

/// Why a connection was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent `disconnect`.
    Logout,
    /// Peer closed the transport.
    TransportClosed,
    /// Transport read or write failed.
    TransportError,
    /// Server is shutting down.
    Shutdown,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CloseReason::Logout => "logout",
            CloseReason::TransportClosed => "transport closed",
            CloseReason::TransportError => "transport error",
            CloseReason::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Gateway-side handle for one connection, owned by its session loop.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: String,
    pub(super) state: ConnectionState,
}

impl ConnectionHandle {
    pub(super) fn new(id: String) -> Self {
        Self {
            id,
            state: ConnectionState::Connecting,
        }
    }

    /// Opaque connection id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Announced identity, if any.
    pub fn user_id(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Identified { user_id } => Some(user_id),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }
}

/// Generate an opaque connection id: 16 random bytes, hex-encoded.
pub(super) fn generate_connection_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_hex_and_distinct() {
        let a = generate_connection_id();
        let b = generate_connection_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn new_handle_starts_connecting() {
        let handle = ConnectionHandle::new("c1".into());
        assert_eq!(handle.state(), &ConnectionState::Connecting);
        assert!(handle.user_id().is_none());
        assert!(!handle.is_closed());
    }
}
