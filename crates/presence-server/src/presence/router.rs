//! Direct-message router.
//!
//! Resolves the recipient through the registry and queues the message on
//! that single connection. Delivery is at-most-once: a missing recipient or
//! a full queue drops the envelope and nothing is reported to the sender.

use super::outbound::OutboundTable;
use super::registry::ConnectionRegistry;
use presence_core::{GetMessagePayload, SendMessagePayload, ServerEvent};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to a routed envelope. Only used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Queued on the recipient's connection.
    Delivered,
    /// No connection registered for the recipient.
    RecipientNotFound,
    /// Recipient is registered but its queue refused the message.
    Undeliverable,
    /// Declared sender does not match the submitting connection's identity.
    SenderMismatch,
}

/// Routes `sendMessage` envelopes to their recipient.
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    outbound: Arc<OutboundTable>,
    enforce_sender_identity: bool,
}

impl MessageRouter {
    /// Create a router. With `enforce_sender_identity` off, the declared
    /// `senderId` is trusted as sent.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        outbound: Arc<OutboundTable>,
        enforce_sender_identity: bool,
    ) -> Self {
        Self {
            registry,
            outbound,
            enforce_sender_identity,
        }
    }

    /// Route one envelope submitted by `from_connection`.
    pub async fn route(&self, from_connection: &str, envelope: &SendMessagePayload) -> RouteOutcome {
        if self.enforce_sender_identity {
            let owner = self.registry.lookup(from_connection).await;
            if owner.as_deref() != Some(envelope.sender_id.as_str()) {
                warn!(
                    connection_id = %from_connection,
                    declared = %envelope.sender_id,
                    registered = ?owner,
                    "sender identity mismatch, envelope dropped"
                );
                return RouteOutcome::SenderMismatch;
            }
        }

        let Some(target) = self.registry.get(&envelope.receiver_id).await else {
            debug!(
                sender = %envelope.sender_id,
                receiver = %envelope.receiver_id,
                "recipient not connected, envelope dropped"
            );
            return RouteOutcome::RecipientNotFound;
        };

        let event = ServerEvent::GetMessage(GetMessagePayload {
            sender_id: envelope.sender_id.clone(),
            text: envelope.text.clone(),
        });
        if self.outbound.send_to(&target, event).await {
            debug!(
                sender = %envelope.sender_id,
                receiver = %envelope.receiver_id,
                "direct message delivered"
            );
            RouteOutcome::Delivered
        } else {
            RouteOutcome::Undeliverable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn envelope(from: &str, to: &str, text: &str) -> SendMessagePayload {
        SendMessagePayload {
            sender_id: from.into(),
            receiver_id: to.into(),
            text: text.into(),
        }
    }

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        outbound: Arc<OutboundTable>,
        rx1: mpsc::Receiver<ServerEvent>,
        rx2: mpsc::Receiver<ServerEvent>,
    }

    async fn fixture() -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new());
        let outbound = Arc::new(OutboundTable::new(8));
        let rx1 = outbound.attach("c1").await;
        let rx2 = outbound.attach("c2").await;
        registry.add("u1", "c1").await;
        registry.add("u2", "c2").await;
        Fixture {
            registry,
            outbound,
            rx1,
            rx2,
        }
    }

    #[tokio::test]
    async fn delivers_to_recipient_only() {
        let mut f = fixture().await;
        let router = MessageRouter::new(f.registry.clone(), f.outbound.clone(), false);

        let outcome = router.route("c1", &envelope("u1", "u2", "hi")).await;
        assert_eq!(outcome, RouteOutcome::Delivered);
        assert_eq!(
            f.rx2.try_recv().unwrap(),
            ServerEvent::GetMessage(GetMessagePayload {
                sender_id: "u1".into(),
                text: "hi".into(),
            })
        );
        assert!(f.rx2.try_recv().is_err());
        assert!(f.rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_recipient_is_silently_dropped() {
        let mut f = fixture().await;
        let router = MessageRouter::new(f.registry.clone(), f.outbound.clone(), false);

        let outcome = router.route("c1", &envelope("u1", "nobody", "hi")).await;
        assert_eq!(outcome, RouteOutcome::RecipientNotFound);
        assert!(f.rx1.try_recv().is_err());
        assert!(f.rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn declared_sender_trusted_by_default() {
        let mut f = fixture().await;
        let router = MessageRouter::new(f.registry.clone(), f.outbound.clone(), false);

        let outcome = router.route("c1", &envelope("mallory", "u2", "hi")).await;
        assert_eq!(outcome, RouteOutcome::Delivered);
        match f.rx2.try_recv().unwrap() {
            ServerEvent::GetMessage(p) => assert_eq!(p.sender_id, "mallory"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn spoofed_sender_dropped_when_enforced() {
        let mut f = fixture().await;
        let router = MessageRouter::new(f.registry.clone(), f.outbound.clone(), true);

        let outcome = router.route("c1", &envelope("u2", "u2", "hi")).await;
        assert_eq!(outcome, RouteOutcome::SenderMismatch);
        assert!(f.rx2.try_recv().is_err());

        let outcome = router.route("c1", &envelope("u1", "u2", "hi")).await;
        assert_eq!(outcome, RouteOutcome::Delivered);
    }

    #[tokio::test]
    async fn recipient_mid_teardown_is_undeliverable() {
        let f = fixture().await;
        let router = MessageRouter::new(f.registry.clone(), f.outbound.clone(), false);
        drop(f.rx2);

        let outcome = router.route("c1", &envelope("u1", "u2", "hi")).await;
        assert_eq!(outcome, RouteOutcome::Undeliverable);
    }
}
