//! presence-client: Rust client library for the presence service.
//!
//! # Quick Start
//!
//! ```no_run
//! use presence_client::PresenceClient;
//!
//! # async fn example() -> presence_core::PresenceResult<()> {
//! let mut client = PresenceClient::connect("ws://localhost:8900").await?;
//! client.announce("alice").await?;
//! client.send_message("alice", "bob", "hello").await?;
//!
//! while let Some(event) = client.next_event().await? {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;

pub use client::PresenceClient;

// Re-export presence-core types for convenience.
pub use presence_core::{GetMessagePayload, PresenceError, PresenceResult, RosterEntry, ServerEvent};
