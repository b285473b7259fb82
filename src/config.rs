//! Client configuration.
//!
//! Loaded from `<config dir>/wavedeck/config.toml`; a missing file means
//! defaults. Every field has a default so partial files are fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub poll: PollSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Playout server, `host:port`.
    pub host: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSection {
    /// Snapshot poll interval while the surface is watched.
    pub foreground_ms: u64,
    /// Poll interval while backgrounded.
    pub background_ms: u64,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            foreground_ms: 3141,
            background_ms: 6666,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config in {}", path.display()))
    }

    fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(dir.join("wavedeck").join("config.toml"))
    }

    pub fn foreground_interval(&self) -> Duration {
        Duration::from_millis(self.poll.foreground_ms)
    }

    pub fn background_interval(&self) -> Duration {
        Duration::from_millis(self.poll.background_ms)
    }
}
