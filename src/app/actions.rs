//! CLI command action handlers

use super::{App, SelectionChange, SyncOutcome, SyncRequest, SyncResult};
use crate::games::GameLayout;
use crate::selection;
use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::path::Path;

impl App {
    // ========== Mod Commands ==========

    pub async fn cmd_list(&self, category: Option<&str>) -> Result<()> {
        let manifest = self.load_manifest().await?;
        let installed = self.installed().await;
        let effective = selection::apply_implications(&manifest, &installed);

        let categories: Vec<&str> = manifest
            .categories()
            .into_iter()
            .filter(|c| category.map_or(true, |wanted| c.eq_ignore_ascii_case(wanted)))
            .collect();
        if categories.is_empty() {
            println!("No mods found.");
            return Ok(());
        }

        for cat in categories {
            println!("{}", cat);
            println!("{:-<60}", "");
            for entry in manifest.iter().filter(|e| e.category == cat) {
                let marker = if installed.contains(&entry.title) {
                    "[x]"
                } else {
                    "[ ]"
                };
                let mut notes = Vec::new();
                if effective.is_locked(&entry.title) {
                    notes.push("required");
                }
                if entry.requires_companion {
                    notes.push("needs Caputilla");
                }
                if !entry.is_installable() {
                    notes.push("info only");
                }
                let notes = if notes.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", notes.join(", "))
                };
                println!(
                    "  {} {}  {} | by {}{}",
                    marker, entry.title, entry.version, entry.author, notes
                );
            }
            println!();
        }
        Ok(())
    }

    pub async fn cmd_status(&self) -> Result<()> {
        let installed = self.installed().await;

        println!("Status");
        println!("{:-<40}", "");
        match self.game_dir() {
            Some(dir) => {
                let valid = if dir.is_dir() { "" } else { " (missing)" };
                println!("Game directory:   {}{}", dir.display(), valid);
                println!(
                    "Plugin directory: {}",
                    dir.join("BepInEx").join("plugins").display()
                );
            }
            None => println!("Game directory:   (not set)"),
        }
        println!(
            "State file:       {}",
            self.paths().installed_state_file().display()
        );
        println!("Installed mods:   {}", installed.len());
        for title in &installed {
            println!("  - {}", title);
        }
        Ok(())
    }

    pub async fn cmd_apply(&self, titles: &[String], reinstall: bool, dry_run: bool) -> Result<()> {
        self.run_sync(SyncRequest {
            change: SelectionChange::Exactly(to_set(titles)),
            reinstall,
            dry_run,
        })
        .await
    }

    pub async fn cmd_install(&self, titles: &[String], reinstall: bool, dry_run: bool) -> Result<()> {
        if titles.is_empty() {
            bail!("Name at least one mod to install. Run 'capumm list' to see available mods.");
        }
        self.run_sync(SyncRequest {
            change: SelectionChange::Add(to_set(titles)),
            reinstall,
            dry_run,
        })
        .await
    }

    pub async fn cmd_remove(&self, titles: &[String], dry_run: bool) -> Result<()> {
        if titles.is_empty() {
            bail!("Name at least one mod to remove.");
        }
        self.run_sync(SyncRequest {
            change: SelectionChange::Remove(to_set(titles)),
            reinstall: false,
            dry_run,
        })
        .await
    }

    async fn run_sync(&self, request: SyncRequest) -> Result<()> {
        let outcome = self.sync(request).await?;
        print_outcome(outcome)
    }

    // ========== Game Commands ==========

    pub async fn cmd_open(&self) -> Result<()> {
        let layout = self.game_layout()?;
        open_folder(layout.root())
    }

    // ========== Config Commands ==========

    pub async fn cmd_config_show(&self) -> Result<()> {
        println!("Configuration");
        println!("{:-<40}", "");
        println!("Config file:      {}", self.paths().config_file().display());
        println!(
            "Game directory:   {}",
            self.config.game_dir.as_deref().unwrap_or("(auto-detect)")
        );
        println!("Manifest URL:     {}", self.config.manifest_url);
        println!("Timeout:          {}s", self.config.network.timeout_secs);
        println!(
            "Connect timeout:  {}s",
            self.config.network.connect_timeout_secs
        );
        println!(
            "Parallel downloads: {}",
            self.config.network.max_concurrent_downloads
        );
        Ok(())
    }

    pub async fn cmd_config_set_game_dir(&mut self, path: &str) -> Result<()> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            self.config.game_dir = None;
            self.config.save().await?;
            println!("Game directory cleared; it will be auto-detected.");
            return Ok(());
        }

        let layout = GameLayout::new(trimmed)?;
        self.config.game_dir = Some(layout.root().display().to_string());
        self.config.save().await?;
        println!("Game directory set to {}", layout.root().display());
        Ok(())
    }

    pub async fn cmd_config_set_manifest_url(&mut self, url: &str) -> Result<()> {
        let trimmed = url.trim();
        url::Url::parse(trimmed).with_context(|| format!("Invalid URL '{}'", trimmed))?;
        self.config.manifest_url = trimmed.to_string();
        self.config.save().await?;
        println!("Manifest URL set to {}", trimmed);
        Ok(())
    }
}

fn to_set(titles: &[String]) -> BTreeSet<String> {
    titles
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn print_outcome(outcome: SyncOutcome) -> Result<()> {
    for title in &outcome.kept_locked {
        println!("Note: {} is required and stays installed.", title);
    }

    match outcome.result {
        SyncResult::Planned(plan) => {
            if plan.is_empty() {
                println!("Nothing to do; installed mods already match the selection.");
            } else {
                println!("Planned operations:");
                for op in plan.operations() {
                    println!("  {}", op);
                }
            }
            for title in &plan.unresolved_removals {
                println!("  ? {} is no longer in the manifest and will be left in place", title);
            }
            Ok(())
        }
        SyncResult::Applied { report, save_error } => {
            println!("{}", report);
            if let Some(e) = save_error {
                println!("Warning: {}", e);
            }
            if !report.is_success() {
                bail!(
                    "{} mod(s) failed: {}",
                    report.failures.len(),
                    report.failed_titles().join(", ")
                );
            }
            Ok(())
        }
    }
}

fn open_folder(path: &Path) -> Result<()> {
    open::that(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(())
}
