//! Selection rules: implied and locked titles

use crate::manifest::Manifest;
use std::collections::BTreeSet;

/// The mod-loader runtime; always selected, never removed
pub const RUNTIME_TITLE: &str = "BepInEx";

/// The companion mod pulled in by entries flagged `requirescaputilla`
pub const COMPANION_TITLE: &str = "Caputilla";

/// A selection after implications have been applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Titles to converge to
    pub titles: BTreeSet<String>,
    /// Titles the user may not deselect this session
    pub locked: BTreeSet<String>,
}

impl Selection {
    pub fn contains(&self, title: &str) -> bool {
        self.titles.contains(title)
    }

    pub fn is_locked(&self, title: &str) -> bool {
        self.locked.contains(title)
    }
}

/// Derive the effective selection from what the user picked.
///
/// Idempotent: feeding `titles` of the result back in yields the same result.
pub fn apply_implications(manifest: &Manifest, user_selection: &BTreeSet<String>) -> Selection {
    let mut titles = BTreeSet::new();
    let mut locked = BTreeSet::new();

    for title in user_selection {
        if manifest.contains(title) {
            titles.insert(title.clone());
        } else {
            tracing::warn!("Ignoring unknown mod '{}'", title);
        }
    }

    if manifest.contains(RUNTIME_TITLE) {
        titles.insert(RUNTIME_TITLE.to_string());
        locked.insert(RUNTIME_TITLE.to_string());
    }

    let needs_companion = manifest
        .iter()
        .any(|e| e.requires_companion && titles.contains(&e.title));
    if needs_companion && manifest.contains(COMPANION_TITLE) {
        titles.insert(COMPANION_TITLE.to_string());
        locked.insert(COMPANION_TITLE.to_string());
    }

    Selection { titles, locked }
}

/// Titles in `selection` whose companion is missing from it
pub fn missing_companions<'a>(
    manifest: &'a Manifest,
    selection: &BTreeSet<String>,
) -> Vec<&'a str> {
    if selection.contains(COMPANION_TITLE) {
        return Vec::new();
    }
    manifest
        .iter()
        .filter(|e| e.requires_companion && selection.contains(&e.title))
        .map(|e| e.title.as_str())
        .collect()
}
