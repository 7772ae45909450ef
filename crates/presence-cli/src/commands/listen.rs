//! `presence listen`: stay online and print what arrives.

use anyhow::{Context, Result};
use presence_client::{PresenceClient, ServerEvent};
use tracing::info;

/// Announce `user` and print events until Ctrl+C or the server closes.
pub async fn run(url: &str, user: &str) -> Result<()> {
    let mut client = PresenceClient::connect(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    client.announce(user).await.context("failed to announce")?;
    info!(url = %url, user = %user, "listening");
    eprintln!("Listening as {user}. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                client.logout().await.context("failed to log out")?;
                return Ok(());
            }
            event = client.next_event() => {
                match event.context("connection error")? {
                    Some(event) => println!("{}", describe(&event)),
                    None => {
                        eprintln!("Server closed the connection.");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// One-line rendering of a server event.
fn describe(event: &ServerEvent) -> String {
    match event {
        ServerEvent::GetMessage(msg) => format!("[{}] {}", msg.sender_id, msg.text),
        ServerEvent::GetUsers(roster) => {
            let users: Vec<&str> = roster.iter().map(|e| e.user_id.as_str()).collect();
            format!("-- online ({}): {}", users.len(), users.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_client::{GetMessagePayload, RosterEntry};

    #[test]
    fn describe_message() {
        let event = ServerEvent::GetMessage(GetMessagePayload {
            sender_id: "alice".into(),
            text: "hi there".into(),
        });
        assert_eq!(describe(&event), "[alice] hi there");
    }

    #[test]
    fn describe_roster() {
        let event = ServerEvent::GetUsers(vec![
            RosterEntry {
                user_id: "alice".into(),
                connection_id: "c1".into(),
            },
            RosterEntry {
                user_id: "bob".into(),
                connection_id: "c2".into(),
            },
        ]);
        assert_eq!(describe(&event), "-- online (2): alice, bob");
    }
}
