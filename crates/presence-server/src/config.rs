//! Server configuration: TOML file + CLI overrides.

use presence_core::{PresenceError, PresenceResult};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::info;

/// What to do when a second connection announces an identity that is
/// already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateIdentityPolicy {
    /// Keep the existing registration; the newcomer stays unregistered.
    #[default]
    FirstWins,
    /// Evict the existing registration in favour of the newcomer.
    LastWins,
}

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub messaging: MessagingSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    /// Capacity of each connection's outbound queue.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

/// `[messaging]` section of the config TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagingSection {
    #[serde(default)]
    pub duplicate_identity: DuplicateIdentityPolicy,
    /// Drop envelopes whose `senderId` is not the submitting connection's identity.
    #[serde(default)]
    pub enforce_sender_identity: bool,
}

fn default_port() -> u16 {
    8900
}
fn default_bind() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}
fn default_outbound_queue() -> usize {
    64
}

/// Resolved server configuration (file values with CLI overrides applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: IpAddr,
    pub outbound_queue: usize,
    pub duplicate_identity: DuplicateIdentityPolicy,
    pub enforce_sender_identity: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_file(ConfigFile::default(), None, None)
    }
}

impl ServerConfig {
    /// Load config from TOML file, then apply CLI overrides.
    pub fn load(
        config_path: Option<&Path>,
        cli_port: Option<u16>,
        cli_bind: Option<IpAddr>,
    ) -> PresenceResult<Self> {
        let file_config = match config_path {
            Some(path) => {
                let expanded = expand_tilde(path);
                if expanded.exists() {
                    info!(path = %expanded.display(), "loading config file");
                    let content = std::fs::read_to_string(&expanded)?;
                    parse_config(&content)?
                } else {
                    info!(path = %expanded.display(), "config file not found, using defaults");
                    ConfigFile::default()
                }
            }
            None => ConfigFile::default(),
        };

        Ok(Self::from_file(file_config, cli_port, cli_bind))
    }

    fn from_file(file: ConfigFile, cli_port: Option<u16>, cli_bind: Option<IpAddr>) -> Self {
        Self {
            port: cli_port.unwrap_or(file.server.port),
            bind: cli_bind.unwrap_or(file.server.bind),
            outbound_queue: file.server.outbound_queue,
            duplicate_identity: file.messaging.duplicate_identity,
            enforce_sender_identity: file.messaging.enforce_sender_identity,
        }
    }

    /// Socket address the listener binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

fn parse_config(content: &str) -> PresenceResult<ConfigFile> {
    toml::from_str::<ConfigFile>(content)
        .map_err(|e| PresenceError::Config(format!("config parse error: {e}")))
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
