//! `presence send`: deliver one direct message.
//!
//! The server never confirms delivery; a message to a user who is not
//! online is dropped silently.

use anyhow::{Context, Result};
use presence_client::PresenceClient;
use tracing::info;

/// Connect as `from`, send `text` to `to`, and log out.
pub async fn run(url: &str, from: &str, to: &str, text: &str) -> Result<()> {
    info!(url = %url, from = %from, to = %to, "sending message");

    let mut client = PresenceClient::connect(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    client.announce(from).await.context("failed to announce")?;
    client
        .send_message(from, to, text)
        .await
        .context("failed to send message")?;
    client.logout().await.context("failed to log out")?;

    println!("Sent to {to}.");
    Ok(())
}
