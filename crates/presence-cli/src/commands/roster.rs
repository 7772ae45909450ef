//! `presence roster`: print who is online.
//!
//! Every connection receives the roster whenever membership changes, so the
//! command announces a throwaway identity of its own and prints the first
//! roster that arrives. Announcing a real user id would be a duplicate while
//! that user is online, and duplicates never trigger a roster.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use presence_client::{PresenceClient, RosterEntry};
use tracing::info;

/// How long to wait for the roster after announcing.
const ROSTER_TIMEOUT: Duration = Duration::from_secs(5);

/// Fetch and print the current roster.
pub async fn run(url: &str) -> Result<()> {
    let lookup_id = lookup_user_id();
    info!(url = %url, user = %lookup_id, "fetching roster");

    let roster = fetch_roster(url, &lookup_id, ROSTER_TIMEOUT).await?;
    print!("{}", format_roster(&roster, &lookup_id));
    Ok(())
}

/// Identity used only for the lookup connection.
fn lookup_user_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("presence-cli-{}-{nanos:08x}", std::process::id())
}

async fn fetch_roster(url: &str, user: &str, wait: Duration) -> Result<Vec<RosterEntry>> {
    let mut client = PresenceClient::connect(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    client.announce(user).await.context("failed to announce")?;

    let roster = tokio::time::timeout(wait, client.next_roster())
        .await
        .map_err(|_| anyhow!("no roster from {url} within {}ms", wait.as_millis()))?
        .context("failed to read roster")?
        .context("server closed the connection before sending a roster")?;

    client.logout().await.context("failed to log out")?;
    Ok(roster)
}

/// Render the roster as a two-column table, leaving out our own `lookup` entry.
fn format_roster(roster: &[RosterEntry], lookup: &str) -> String {
    let users: Vec<&RosterEntry> = roster.iter().filter(|e| e.user_id != lookup).collect();
    if users.is_empty() {
        return "No users online.\n".to_string();
    }

    let width = users
        .iter()
        .map(|e| e.user_id.len())
        .max()
        .unwrap_or(0)
        .max("USER".len());

    let mut out = format!("{:<width$}  CONNECTION\n", "USER");
    for entry in &users {
        out.push_str(&format!("{:<width$}  {}\n", entry.user_id, entry.connection_id));
    }
    out.push_str(&format!("\n{} user(s) online\n", users.len()));
    out
}
