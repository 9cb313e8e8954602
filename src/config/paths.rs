//! XDG-compliant path management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Manages all application paths using XDG base directory specification
#[derive(Debug, Clone)]
pub struct Paths {
    config_dir: PathBuf,
    data_dir: PathBuf,
    cache_dir: PathBuf,
}

impl Paths {
    /// Resolve the per-user directories for this application
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "capumm")
            .context("Failed to determine project directories")?;
        Ok(Self {
            config_dir: dirs.config_dir().to_path_buf(),
            data_dir: dirs.data_dir().to_path_buf(),
            cache_dir: dirs.cache_dir().to_path_buf(),
        })
    }

    /// Lay all directories out under a single root
    pub fn at(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
        }
    }

    // ========== Config Paths ==========

    /// Config directory: ~/.config/capumm/
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Main config file: ~/.config/capumm/config.toml
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    // ========== Data Paths ==========

    /// Data directory: ~/.local/share/capumm/
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// Installed-state record: ~/.local/share/capumm/installed.json
    pub fn installed_state_file(&self) -> PathBuf {
        self.data_dir.join("installed.json")
    }

    /// Log file: ~/.local/share/capumm/capumm.log
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("capumm.log")
    }

    // ========== Cache Paths ==========

    /// Download staging area: ~/.cache/capumm/staging/
    pub fn staging_dir(&self) -> PathBuf {
        self.cache_dir.join("staging")
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.staging_dir())?;
        Ok(())
    }
}
