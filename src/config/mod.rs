//! Configuration management for capumm
//!
//! Uses XDG-compliant paths:
//! - Config: ~/.config/capumm/config.toml
//! - Data: ~/.local/share/capumm/
//! - Cache: ~/.cache/capumm/

mod paths;

pub use paths::Paths;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Catalog location used when none is configured
pub const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/Instel12/Capu-Mod-Manager/refs/heads/main/manifest.json";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Game install directory. Detected from Steam libraries when unset.
    pub game_dir: Option<String>,

    /// Where the mod manifest is fetched from
    pub manifest_url: String,

    /// HTTP settings for manifest and mod downloads
    pub network: NetworkConfig,

    /// Paths configuration
    #[serde(skip)]
    pub paths: Option<Paths>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            game_dir: None,
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            network: NetworkConfig::default(),
            paths: None,
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Upper bound for a whole request, body included
    pub timeout_secs: u64,

    /// Upper bound for establishing a connection
    pub connect_timeout_secs: u64,

    /// Number of mod downloads allowed in flight at once
    pub max_concurrent_downloads: usize,

    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            connect_timeout_secs: 15,
            max_concurrent_downloads: 3,
            user_agent: format!("capumm/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Resolved paths; falls back to the per-user defaults
    pub fn paths(&self) -> Result<Paths> {
        match &self.paths {
            Some(paths) => Ok(paths.clone()),
            None => Paths::new(),
        }
    }

    /// Configured game directory, if any
    pub fn game_dir_override(&self) -> Option<PathBuf> {
        self.game_dir
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Load configuration from the default location or create it
    pub async fn load() -> Result<Self> {
        Self::load_from(Paths::new()?).await
    }

    /// Load configuration rooted at `paths`, writing defaults on first use
    pub async fn load_from(paths: Paths) -> Result<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            let mut config = Config::default();
            config.paths = Some(paths.clone());
            config.save().await?;
            config
        };

        config.paths = Some(paths);
        Ok(config)
    }

    /// Save configuration to disk
    pub async fn save(&self) -> Result<()> {
        let config_path = self.paths()?.config_file();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .await
            .context("Failed to write config file")?;

        Ok(())
    }
}
