//! Client configuration at `~/.presence/config.toml`.
//!
//! Provides the default server URL and user id. CLI flags always override
//! config file values.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default: DefaultConfig,
}

/// Default connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultConfig {
    /// Server URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// User id to announce (empty = none).
    #[serde(default)]
    pub user: String,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            user: String::new(),
        }
    }
}

fn default_url() -> String {
    "ws://localhost:8900".to_string()
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Pick the user id: explicit flag, then config, else an error.
    pub fn resolve_user(&self, flag: Option<&str>) -> Result<String> {
        match flag {
            Some(user) if !user.is_empty() => Ok(user.to_string()),
            _ if !self.default.user.is_empty() => Ok(self.default.user.clone()),
            _ => anyhow::bail!("no user id given on the command line and no `user` in the config file"),
        }
    }
}
