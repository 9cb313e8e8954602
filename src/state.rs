//! Installed-state store
//!
//! A JSON array of the titles the last reconciliation left on disk. Reading
//! never fails: an absent or unreadable record means nothing is installed.

use crate::error::Error;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Persists the set of installed mod titles
#[derive(Debug, Clone)]
pub struct InstalledStateStore {
    path: PathBuf,
}

impl InstalledStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the recorded titles, treating any failure as "no record"
    pub async fn load(&self) -> BTreeSet<String> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No installed-state record at {}", self.path.display());
                return BTreeSet::new();
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read installed state {}: {}; assuming nothing is installed",
                    self.path.display(),
                    e
                );
                return BTreeSet::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(titles) => titles.into_iter().collect(),
            Err(e) => {
                tracing::warn!(
                    "Installed state {} is corrupt ({}); assuming nothing is installed",
                    self.path.display(),
                    e
                );
                BTreeSet::new()
            }
        }
    }

    /// Replace the record wholesale with `titles`
    pub async fn save(&self, titles: &BTreeSet<String>) -> Result<(), Error> {
        self.write(titles).await.map_err(|e| Error::StatePersistence {
            path: self.path.clone(),
            cause: format!("{:#}", e),
        })
    }

    async fn write(&self, titles: &BTreeSet<String>) -> anyhow::Result<()> {
        use anyhow::Context;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create state directory")?;
        }

        let list: Vec<&String> = titles.iter().collect();
        let content = serde_json::to_string_pretty(&list).context("Failed to serialize state")?;

        // Write beside the record, then swap it in
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .context("Failed to write state file")?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .context("Failed to replace state file")?;

        tracing::debug!("Saved {} installed title(s)", titles.len());
        Ok(())
    }
}
