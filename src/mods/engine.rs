//! Reconciliation engine
//!
//! Executes an [`OperationPlan`] against a game directory. Removals run
//! first, then downloads are fetched concurrently into a per-run staging
//! directory, then each download is materialized sequentially in manifest
//! order. Every failure is scoped to its title; the run always produces a
//! new installed state that reflects what is actually on disk.

use super::archive::{self, Materialized};
use super::fetch::Fetcher;
use super::plan::{Install, InstallTarget, OperationPlan};
use crate::error::{Error, TitleError};
use crate::games::GameLayout;
use crate::manifest::Manifest;
use crate::selection;
use anyhow::{anyhow, Context};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Outcome of a reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Titles confirmed present after the run; persist this
    pub installed: BTreeSet<String>,
    /// Titles whose artifacts were removed
    pub removed: Vec<String>,
    /// Titles installed by this run
    pub newly_installed: Vec<String>,
    /// Titles that should have been removed but whose artifact is unknown
    pub skipped_removals: Vec<String>,
    /// Per-title failures, in execution order
    pub failures: Vec<TitleError>,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_titles(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.title()).collect()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.removed.is_empty() && self.newly_installed.is_empty() && self.failures.is_empty() {
            writeln!(f, "Nothing to do; installed mods already match the selection.")?;
        }
        for title in &self.removed {
            writeln!(f, "  - removed   {}", title)?;
        }
        for title in &self.newly_installed {
            writeln!(f, "  + installed {}", title)?;
        }
        for title in &self.skipped_removals {
            writeln!(f, "  ? kept      {} (no longer in manifest; remove its files manually)", title)?;
        }
        for failure in &self.failures {
            writeln!(f, "  ! failed    {}: {}", failure.title(), failure.reason())?;
        }
        write!(
            f,
            "{} installed, {} removed, {} failed",
            self.newly_installed.len(),
            self.removed.len(),
            self.failures.len()
        )
    }
}

/// Converges a game directory to a desired mod set
pub struct Reconciler {
    fetcher: Arc<dyn Fetcher>,
    staging_root: PathBuf,
    max_concurrent: usize,
}

impl Reconciler {
    pub fn new(fetcher: Arc<dyn Fetcher>, staging_root: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            staging_root: staging_root.into(),
            max_concurrent: 3,
        }
    }

    /// Limit the number of downloads in flight
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Plan and apply the changes taking `installed` to `desired`.
    ///
    /// Only an invalid `game_dir` is an error; everything else ends up in the
    /// report.
    pub async fn reconcile(
        &self,
        manifest: &Manifest,
        desired: &BTreeSet<String>,
        installed: &BTreeSet<String>,
        game_dir: &Path,
        reinstall: bool,
    ) -> Result<ReconcileReport, Error> {
        let layout = GameLayout::new(game_dir)?;

        for title in selection::missing_companions(manifest, desired) {
            tracing::warn!(
                "'{}' requires {} which is not selected; installing anyway",
                title,
                selection::COMPANION_TITLE
            );
        }

        let plan = OperationPlan::compute(manifest, desired, installed, reinstall);
        Ok(self.execute(&plan, installed, &layout).await)
    }

    /// Apply a computed plan
    pub async fn execute(
        &self,
        plan: &OperationPlan,
        installed: &BTreeSet<String>,
        layout: &GameLayout,
    ) -> ReconcileReport {
        let mut report = ReconcileReport {
            installed: installed.clone(),
            skipped_removals: plan.unresolved_removals.clone(),
            ..Default::default()
        };

        for title in &plan.unresolved_removals {
            tracing::warn!("Cannot remove '{}': its file is unknown", title);
        }
        for (file, titles) in plan.file_collisions() {
            tracing::warn!(
                "{} all install {}; the last one wins",
                titles.join(", "),
                file
            );
        }

        let plugins_dir = layout.plugins_dir();
        for removal in &plan.removals {
            match remove_artifact(&plugins_dir, &removal.file_name) {
                Ok(existed) => {
                    if existed {
                        tracing::info!("Removed {} ({})", removal.title, removal.file_name);
                    } else {
                        tracing::info!("{} was already gone", removal.title);
                    }
                    report.installed.remove(&removal.title);
                    report.removed.push(removal.title.clone());
                }
                Err(e) => {
                    tracing::error!("Failed to remove {}: {:#}", removal.title, e);
                    report.failures.push(TitleError::FilesystemFailed {
                        title: removal.title.clone(),
                        cause: format!("{:#}", e),
                    });
                }
            }
        }

        if plan.installs.is_empty() {
            return report;
        }

        let staging = match self.create_staging() {
            Ok(dir) => dir,
            Err(e) => {
                tracing::error!("Cannot stage downloads: {:#}", e);
                for install in &plan.installs {
                    report.installed.remove(&install.title);
                    report.failures.push(TitleError::FilesystemFailed {
                        title: install.title.clone(),
                        cause: format!("{:#}", e),
                    });
                }
                return report;
            }
        };

        let fetched = self.fetch_all(&plan.installs, staging.path()).await;

        for (install, result) in plan.installs.iter().zip(fetched) {
            let staged = match result {
                Ok(path) => path,
                Err(e) => {
                    tracing::error!("Failed to download {}: {:#}", install.title, e);
                    report.installed.remove(&install.title);
                    report.failures.push(TitleError::DownloadFailed {
                        title: install.title.clone(),
                        cause: format!("{:#}", e),
                    });
                    continue;
                }
            };

            let target = match install.target {
                InstallTarget::GameRoot => layout.root().to_path_buf(),
                InstallTarget::Plugins => plugins_dir.clone(),
            };

            match archive::materialize(&staged, &install.file_name, &target) {
                Ok(Materialized::Extracted { files }) => {
                    tracing::info!(
                        "Installed {} ({} files into {})",
                        install.title,
                        files,
                        target.display()
                    );
                    report.installed.insert(install.title.clone());
                    report.newly_installed.push(install.title.clone());
                }
                Ok(Materialized::Copied { path }) => {
                    tracing::info!("Installed {} ({})", install.title, path.display());
                    report.installed.insert(install.title.clone());
                    report.newly_installed.push(install.title.clone());
                }
                Err(e) => {
                    let failure = e.for_title(&install.title);
                    tracing::error!("{}", failure);
                    report.installed.remove(&install.title);
                    report.failures.push(failure);
                }
            }

            if let Err(e) = std::fs::remove_file(&staged) {
                tracing::debug!("Failed to discard {}: {}", staged.display(), e);
            }
        }

        report
    }

    fn create_staging(&self) -> anyhow::Result<tempfile::TempDir> {
        std::fs::create_dir_all(&self.staging_root)
            .with_context(|| format!("Failed to create {}", self.staging_root.display()))?;
        tempfile::Builder::new()
            .prefix("run-")
            .tempdir_in(&self.staging_root)
            .context("Failed to create staging directory")
    }

    /// Download every install into `staging`, at most `max_concurrent` at a
    /// time. Results come back in the order of `installs`.
    async fn fetch_all(
        &self,
        installs: &[Install],
        staging: &Path,
    ) -> Vec<anyhow::Result<PathBuf>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(installs.len());

        for (index, install) in installs.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let url = install.url.clone();
            let title = install.title.clone();
            let dest = staging.join(format!("{}-{}", index, install.file_name));

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .context("Download pool closed")?;
                tracing::info!("Downloading {} from {}", title, url);
                fetcher.fetch(&url, &dest).await?;
                Ok::<PathBuf, anyhow::Error>(dest)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(anyhow!("download task failed: {}", e)),
            });
        }
        results
    }
}

/// Delete `file_name` from `dir`. Returns whether it existed.
fn remove_artifact(dir: &Path, file_name: &str) -> anyhow::Result<bool> {
    let path = dir.join(file_name);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
    }
}
