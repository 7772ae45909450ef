//! Presence core: registry, outbound queues, roster broadcast, and routing.

pub mod broadcaster;
pub mod outbound;
pub mod registry;
pub mod router;

pub use broadcaster::PresenceBroadcaster;
pub use outbound::OutboundTable;
pub use registry::{ConnectionRecord, ConnectionRegistry};
pub use router::{MessageRouter, RouteOutcome};
