//! Application state and orchestration

mod actions;

use crate::config::{Config, Paths};
use crate::error::Error;
use crate::games::{self, GameLayout};
use crate::manifest::{FileManifestSource, HttpManifestSource, Manifest, ManifestSource};
use crate::mods::{Fetcher, HttpFetcher, OperationPlan, ReconcileReport, Reconciler};
use crate::selection::{self, Selection};
use crate::state::InstalledStateStore;

use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-invocation overrides from the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub game_dir: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
}

/// How the user's request maps onto the desired mod set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    /// Exactly these titles
    Exactly(BTreeSet<String>),
    /// Everything installed plus these
    Add(BTreeSet<String>),
    /// Everything installed minus these
    Remove(BTreeSet<String>),
}

/// A reconciliation request
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub change: SelectionChange,
    pub reinstall: bool,
    pub dry_run: bool,
}

/// Result of [`App::sync`]
#[derive(Debug)]
pub struct SyncOutcome {
    pub selection: Selection,
    /// Titles the user asked to drop that selection rules keep
    pub kept_locked: Vec<String>,
    pub result: SyncResult,
}

#[derive(Debug)]
pub enum SyncResult {
    /// Dry run: what would happen
    Planned(OperationPlan),
    /// The run happened; `save_error` is set if the new state was not persisted
    Applied {
        report: ReconcileReport,
        save_error: Option<Error>,
    },
}

/// Main application struct that orchestrates all components
pub struct App {
    /// Application configuration
    pub config: Config,

    paths: Paths,
    game_dir: Option<PathBuf>,
    manifest_source: Box<dyn ManifestSource>,
    store: InstalledStateStore,
    reconciler: Reconciler,

    /// Serializes reconciliation runs
    run_lock: Mutex<()>,
}

impl App {
    /// Create a new App instance
    pub async fn new(config: Config, overrides: Overrides) -> Result<Self> {
        let paths = config.paths()?;
        paths.ensure_dirs().context("Failed to create directories")?;

        let manifest_source: Box<dyn ManifestSource> = match &overrides.manifest {
            Some(path) => Box::new(FileManifestSource::new(path)),
            None => Box::new(HttpManifestSource::new(
                config.manifest_url.clone(),
                &config.network,
            )?),
        };

        let fetcher = Arc::new(HttpFetcher::new(&config.network)?);
        let game_dir = overrides
            .game_dir
            .clone()
            .or_else(|| games::resolve_game_dir(config.game_dir_override()));

        Ok(Self::with_parts(config, paths, manifest_source, fetcher, game_dir))
    }

    /// Assemble an App from explicit collaborators
    pub fn with_parts(
        config: Config,
        paths: Paths,
        manifest_source: Box<dyn ManifestSource>,
        fetcher: Arc<dyn Fetcher>,
        game_dir: Option<PathBuf>,
    ) -> Self {
        let reconciler = Reconciler::new(fetcher, paths.staging_dir())
            .with_max_concurrent(config.network.max_concurrent_downloads);
        let store = InstalledStateStore::new(paths.installed_state_file());

        Self {
            config,
            paths,
            game_dir,
            manifest_source,
            store,
            reconciler,
            run_lock: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Game directory in effect, if one is configured or detected
    pub fn game_dir(&self) -> Option<&PathBuf> {
        self.game_dir.as_ref()
    }

    /// Validated layout of the game directory
    pub fn game_layout(&self) -> Result<GameLayout> {
        match &self.game_dir {
            Some(dir) => Ok(GameLayout::new(dir)?),
            None => bail!(
                "No game directory configured and none detected. \
                 Use 'capumm config set-game-dir <path>' or pass --game-dir."
            ),
        }
    }

    pub async fn load_manifest(&self) -> Result<Manifest, Error> {
        tracing::debug!("Loading manifest from {}", self.manifest_source.describe());
        self.manifest_source.load().await
    }

    /// Titles currently recorded as installed
    pub async fn installed(&self) -> BTreeSet<String> {
        self.store.load().await
    }

    /// Converge the game directory to the requested selection and record
    /// the result.
    pub async fn sync(&self, request: SyncRequest) -> Result<SyncOutcome> {
        let _guard = self.run_lock.lock().await;

        let manifest = self.load_manifest().await?;
        let layout = self.game_layout()?;
        let installed = self.store.load().await;

        let requested = match &request.change {
            SelectionChange::Exactly(titles)
            | SelectionChange::Add(titles)
            | SelectionChange::Remove(titles) => titles,
        };
        let unknown: Vec<&str> = requested
            .iter()
            .filter(|t| !manifest.contains(t))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            bail!("Unknown mod(s): {}", unknown.join(", "));
        }

        let user_selection = match &request.change {
            SelectionChange::Exactly(titles) => titles.clone(),
            SelectionChange::Add(titles) => installed.union(titles).cloned().collect(),
            SelectionChange::Remove(titles) => installed.difference(titles).cloned().collect(),
        };

        let selection = selection::apply_implications(&manifest, &user_selection);
        let kept_locked = match &request.change {
            SelectionChange::Remove(titles) => titles
                .iter()
                .filter(|t| selection.contains(t))
                .cloned()
                .collect(),
            _ => Vec::new(),
        };

        if request.dry_run {
            let plan = OperationPlan::compute(
                &manifest,
                &selection.titles,
                &installed,
                request.reinstall,
            );
            return Ok(SyncOutcome {
                selection,
                kept_locked,
                result: SyncResult::Planned(plan),
            });
        }

        tracing::info!(
            "Reconciling {} selected mod(s) against {} installed in {}",
            selection.titles.len(),
            installed.len(),
            layout.root().display()
        );
        let report = self
            .reconciler
            .reconcile(
                &manifest,
                &selection.titles,
                &installed,
                layout.root(),
                request.reinstall,
            )
            .await?;

        let save_error = self.store.save(&report.installed).await.err();
        if let Some(e) = &save_error {
            tracing::error!("{}", e);
        }

        Ok(SyncOutcome {
            selection,
            kept_locked,
            result: SyncResult::Applied { report, save_error },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{COMPANION_TITLE, RUNTIME_TITLE};
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    /// Writes the URL's last segment as the file body
    struct EchoFetcher;

    #[async_trait]
    impl Fetcher for EchoFetcher {
        async fn fetch(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
            if url.contains("unreachable") {
                anyhow::bail!("connection refused");
            }
            let body = url.rsplit('/').next().unwrap_or_default();
            std::fs::write(dest, body)?;
            Ok(body.len() as u64)
        }
    }

    const MANIFEST: &str = r#"[
        {"title": "BepInEx", "catagory": "Core", "download": "https://example.com/BepInEx.dll"},
        {"title": "Caputilla", "catagory": "Core", "download": "https://example.com/Caputilla.dll"},
        {"title": "Fly", "download": "https://example.com/Fly.dll", "requirescaputilla": "true"},
        {"title": "Skins", "download": "https://example.com/Skins.dll"},
        {"title": "Broken", "download": "https://unreachable.example.com/Broken.dll"}
    ]"#;

    struct Harness {
        root: TempDir,
        game: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            std::fs::write(root.path().join("manifest.json"), MANIFEST).unwrap();
            Self {
                root,
                game: tempfile::tempdir().unwrap(),
            }
        }

        fn app(&self) -> App {
            let paths = Paths::at(self.root.path());
            App::with_parts(
                Config::default(),
                paths,
                Box::new(FileManifestSource::new(self.root.path().join("manifest.json"))),
                Arc::new(EchoFetcher),
                Some(self.game.path().to_path_buf()),
            )
        }

        fn plugin(&self, file: &str) -> PathBuf {
            self.game.path().join("BepInEx").join("plugins").join(file)
        }
    }

    fn set(titles: &[&str]) -> BTreeSet<String> {
        titles.iter().map(|t| t.to_string()).collect()
    }

    fn request(change: SelectionChange) -> SyncRequest {
        SyncRequest {
            change,
            reinstall: false,
            dry_run: false,
        }
    }

    fn applied(outcome: SyncOutcome) -> (ReconcileReport, Option<Error>) {
        match outcome.result {
            SyncResult::Applied { report, save_error } => (report, save_error),
            SyncResult::Planned(_) => panic!("expected an applied run"),
        }
    }

    #[tokio::test]
    async fn test_sync_installs_and_persists() {
        let h = Harness::new();
        let app = h.app();

        let outcome = app
            .sync(request(SelectionChange::Exactly(set(&["Fly"]))))
            .await
            .unwrap();
        assert!(outcome.selection.is_locked(COMPANION_TITLE));

        let (report, save_error) = applied(outcome);
        assert!(save_error.is_none());
        assert_eq!(report.installed, set(&[RUNTIME_TITLE, COMPANION_TITLE, "Fly"]));
        assert!(h.plugin("Fly.dll").is_file());
        assert!(h.plugin("Caputilla.dll").is_file());

        assert_eq!(app.installed().await, report.installed);
    }

    #[tokio::test]
    async fn test_add_and_remove_relative_to_installed() {
        let h = Harness::new();
        let app = h.app();

        app.sync(request(SelectionChange::Add(set(&["Skins"]))))
            .await
            .unwrap();
        app.sync(request(SelectionChange::Add(set(&["Fly"]))))
            .await
            .unwrap();
        assert_eq!(
            app.installed().await,
            set(&[RUNTIME_TITLE, COMPANION_TITLE, "Fly", "Skins"])
        );

        let outcome = app
            .sync(request(SelectionChange::Remove(set(&["Skins", RUNTIME_TITLE]))))
            .await
            .unwrap();
        assert_eq!(outcome.kept_locked, vec![RUNTIME_TITLE.to_string()]);
        let (report, _) = applied(outcome);
        assert_eq!(report.removed, vec!["Skins"]);
        assert!(!h.plugin("Skins.dll").exists());
        assert!(h.plugin("BepInEx.dll").exists());
    }

    #[tokio::test]
    async fn test_partial_failure_is_persisted() {
        let h = Harness::new();
        let app = h.app();

        let (report, _) = applied(
            app.sync(request(SelectionChange::Exactly(set(&["Skins", "Broken"]))))
                .await
                .unwrap(),
        );
        assert_eq!(report.failed_titles(), vec!["Broken"]);
        assert_eq!(app.installed().await, set(&[RUNTIME_TITLE, "Skins"]));
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let h = Harness::new();
        let app = h.app();

        let outcome = app
            .sync(SyncRequest {
                change: SelectionChange::Exactly(set(&["Skins"])),
                reinstall: false,
                dry_run: true,
            })
            .await
            .unwrap();

        match outcome.result {
            SyncResult::Planned(plan) => assert_eq!(plan.installs.len(), 2),
            SyncResult::Applied { .. } => panic!("dry run applied changes"),
        }
        assert!(!h.plugin("Skins.dll").exists());
        assert!(app.installed().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_title_rejected() {
        let h = Harness::new();
        let app = h.app();

        let err = app
            .sync(request(SelectionChange::Add(set(&["Nope"]))))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }

    #[tokio::test]
    async fn test_invalid_game_dir_aborts() {
        let h = Harness::new();
        let app = App::with_parts(
            Config::default(),
            Paths::at(h.root.path()),
            Box::new(FileManifestSource::new(h.root.path().join("manifest.json"))),
            Arc::new(EchoFetcher),
            Some(h.game.path().join("missing")),
        );

        let err = app
            .sync(request(SelectionChange::Exactly(set(&["Skins"]))))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::GameDirectoryInvalid(_))
        ));
        assert!(app.installed().await.is_empty());
    }

    #[tokio::test]
    async fn test_state_save_failure_is_reported() {
        let h = Harness::new();
        let app = h.app();
        std::fs::create_dir_all(app.paths().installed_state_file().join("blocked")).unwrap();

        let (report, save_error) = applied(
            app.sync(request(SelectionChange::Exactly(set(&["Skins"]))))
                .await
                .unwrap(),
        );
        assert!(report.is_success());
        assert!(h.plugin("Skins.dll").is_file());
        assert!(matches!(save_error, Some(Error::StatePersistence { .. })));
    }
}
