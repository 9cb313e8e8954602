//! Operation planning: the difference between what is installed and what is wanted

use super::archive::ArchiveFormat;
use crate::manifest::Manifest;
use crate::selection::RUNTIME_TITLE;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Where an install lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallTarget {
    /// The game root (runtime archives only)
    GameRoot,
    /// The shared plugin directory
    Plugins,
}

/// Delete a mod's artifact from the plugin directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub title: String,
    pub file_name: String,
}

/// Download and materialize a mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Install {
    pub title: String,
    pub url: String,
    pub file_name: String,
    pub target: InstallTarget,
}

/// A single planned step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation<'a> {
    Remove(&'a Removal),
    Install(&'a Install),
}

impl fmt::Display for Operation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Remove(r) => write!(f, "remove  {} ({})", r.title, r.file_name),
            Operation::Install(i) => {
                let target = match i.target {
                    InstallTarget::GameRoot => "game root",
                    InstallTarget::Plugins => "plugins",
                };
                write!(f, "install {} ({} -> {})", i.title, i.file_name, target)
            }
        }
    }
}

/// Ordered removals then installs, both in manifest order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationPlan {
    pub removals: Vec<Removal>,
    pub installs: Vec<Install>,
    /// Installed titles that should go but whose artifact is unknown
    pub unresolved_removals: Vec<String>,
}

impl OperationPlan {
    /// Plan the steps that take `installed` to `desired`.
    ///
    /// The runtime entry is implicitly desired and never removed. Titles that
    /// are installed and still desired are left alone unless `reinstall`.
    pub fn compute(
        manifest: &Manifest,
        desired: &BTreeSet<String>,
        installed: &BTreeSet<String>,
        reinstall: bool,
    ) -> Self {
        let wanted = |title: &str| title == RUNTIME_TITLE || desired.contains(title);

        let mut plan = OperationPlan::default();

        for entry in manifest.iter() {
            if !installed.contains(&entry.title) || wanted(&entry.title) {
                continue;
            }
            match &entry.download {
                Some(download) => plan.removals.push(Removal {
                    title: entry.title.clone(),
                    file_name: download.file_name.clone(),
                }),
                None => plan.unresolved_removals.push(entry.title.clone()),
            }
        }

        plan.unresolved_removals.extend(
            installed
                .iter()
                .filter(|t| !wanted(t) && !manifest.contains(t))
                .cloned(),
        );

        for entry in manifest.iter() {
            if !wanted(&entry.title) || (installed.contains(&entry.title) && !reinstall) {
                continue;
            }
            let Some(download) = &entry.download else {
                continue;
            };

            let is_archive = ArchiveFormat::from_file_name(&download.file_name).is_some();
            let target = if entry.title == RUNTIME_TITLE && is_archive {
                InstallTarget::GameRoot
            } else {
                InstallTarget::Plugins
            };

            plan.installs.push(Install {
                title: entry.title.clone(),
                url: download.url.clone(),
                file_name: download.file_name.clone(),
                target,
            });
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.installs.is_empty()
    }

    /// All steps in execution order
    pub fn operations(&self) -> impl Iterator<Item = Operation<'_>> {
        self.removals
            .iter()
            .map(Operation::Remove)
            .chain(self.installs.iter().map(Operation::Install))
    }

    /// Single-file installs that would write the same plugin file name.
    /// The later install in manifest order wins.
    pub fn file_collisions(&self) -> Vec<(String, Vec<String>)> {
        let mut by_file: HashMap<&str, Vec<String>> = HashMap::new();
        for install in &self.installs {
            let is_archive = ArchiveFormat::from_file_name(&install.file_name).is_some();
            if install.target == InstallTarget::Plugins && !is_archive {
                by_file
                    .entry(install.file_name.as_str())
                    .or_default()
                    .push(install.title.clone());
            }
        }

        let mut collisions: Vec<_> = by_file
            .into_iter()
            .filter(|(_, titles)| titles.len() > 1)
            .map(|(file, titles)| (file.to_string(), titles))
            .collect();
        collisions.sort();
        collisions
    }
}
