//! Mod catalog model
//!
//! The remote manifest is a JSON array of loosely-typed objects. It is
//! parsed once into [`Manifest`], after which nothing in the crate looks at
//! raw manifest strings again.

mod source;

pub use source::*;

use crate::error::Error;
use serde::Deserialize;
use std::collections::HashSet;

/// Category used when an entry does not name one
pub const DEFAULT_CATEGORY: &str = "Other";

/// A downloadable artifact for a mod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub url: String,
    /// Last path segment of the URL; the name the artifact gets on disk
    pub file_name: String,
}

/// A single catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModEntry {
    pub title: String,
    pub version: String,
    pub author: String,
    pub category: String,
    /// `None` for informational entries that cannot be installed
    pub download: Option<Download>,
    pub requires_companion: bool,
}

impl ModEntry {
    pub fn is_installable(&self) -> bool {
        self.download.is_some()
    }
}

/// Wire shape of a manifest element
#[derive(Debug, Deserialize)]
struct RawModEntry {
    title: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default, rename = "catagory")]
    category: Option<String>,
    #[serde(default)]
    download: Option<String>,
    #[serde(default, rename = "requirescaputilla")]
    requires_companion: Option<serde_json::Value>,
}

/// An ordered, title-unique mod catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ModEntry>,
}

impl Manifest {
    /// Parse a manifest document
    pub fn from_json(content: &str) -> Result<Self, Error> {
        let raw: Vec<RawModEntry> = serde_json::from_str(content)
            .map_err(|e| Error::ManifestInvalid(format!("not a JSON array of mods: {}", e)))?;

        let entries = raw
            .into_iter()
            .enumerate()
            .map(|(index, raw)| ingest(index, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(entries)
    }

    /// Build a manifest from already-typed entries, enforcing title uniqueness
    pub fn new(entries: Vec<ModEntry>) -> Result<Self, Error> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.title.as_str()) {
                return Err(Error::ManifestInvalid(format!(
                    "duplicate title '{}'",
                    entry.title
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModEntry> {
        self.entries.iter()
    }

    pub fn get(&self, title: &str) -> Option<&ModEntry> {
        self.entries.iter().find(|e| e.title == title)
    }

    pub fn contains(&self, title: &str) -> bool {
        self.get(title).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct categories in first-seen order
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|e| e.category.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }
}

fn ingest(index: usize, raw: RawModEntry) -> Result<ModEntry, Error> {
    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::ManifestInvalid(format!("entry #{} has no title", index)))?;

    let download = match raw.download.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(url) => {
            let file_name = artifact_name(url).ok_or_else(|| {
                Error::ManifestInvalid(format!(
                    "download URL for '{}' does not name a file: {}",
                    title, url
                ))
            })?;
            Some(Download {
                url: url.to_string(),
                file_name,
            })
        }
    };

    Ok(ModEntry {
        title,
        version: raw.version.unwrap_or_default(),
        author: raw.author.unwrap_or_else(|| "Unknown Author".to_string()),
        category: raw
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        download,
        requires_companion: raw
            .requires_companion
            .as_ref()
            .map(parse_flag)
            .unwrap_or(false),
    })
}

/// `"true"` in any case, or a JSON `true`
fn parse_flag(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        serde_json::Value::Bool(b) => *b,
        _ => false,
    }
}

/// Derive the on-disk artifact name from a download URL (its last path segment)
pub fn artifact_name(url: &str) -> Option<String> {
    let segment = match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string),
        Err(_) => url.rsplit('/').next().map(str::to_string),
    }?;

    match segment.as_str() {
        "" | "." | ".." => None,
        _ if segment.contains('\\') => None,
        _ => Some(segment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "title": "BepInEx",
            "version": "5.4.23",
            "author": "BepInEx Team",
            "catagory": "Core",
            "download": "https://example.com/files/BepInEx_win_x64.7z",
            "requirescaputilla": "false"
        },
        {
            "title": "Caputilla",
            "version": "1.2.0",
            "author": "Caputilla Devs",
            "catagory": "Core",
            "download": "https://example.com/files/Caputilla.dll"
        },
        {
            "title": "Monke Fly",
            "version": "0.3",
            "author": "someone",
            "download": "https://example.com/files/MonkeFly.dll",
            "requirescaputilla": "TRUE"
        },
        {
            "title": "Read Me",
            "version": "",
            "author": "staff",
            "catagory": "Info",
            "download": ""
        }
    ]"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_json(SAMPLE).unwrap();
        assert_eq!(manifest.len(), 4);

        let bepinex = manifest.get("BepInEx").unwrap();
        assert_eq!(bepinex.category, "Core");
        assert!(!bepinex.requires_companion);
        assert_eq!(
            bepinex.download.as_ref().unwrap().file_name,
            "BepInEx_win_x64.7z"
        );

        let fly = manifest.get("Monke Fly").unwrap();
        assert!(fly.requires_companion);
        assert_eq!(fly.category, DEFAULT_CATEGORY);

        let caputilla = manifest.get("Caputilla").unwrap();
        assert!(!caputilla.requires_companion);

        let info = manifest.get("Read Me").unwrap();
        assert!(!info.is_installable());
    }

    #[test]
    fn test_companion_flag_parsing() {
        let json = r#"[
            {"title": "A", "requirescaputilla": "True"},
            {"title": "B", "requirescaputilla": "no"},
            {"title": "C", "requirescaputilla": true},
            {"title": "D", "requirescaputilla": 1}
        ]"#;
        let manifest = Manifest::from_json(json).unwrap();
        let flags: Vec<bool> = manifest.iter().map(|e| e.requires_companion).collect();
        assert_eq!(flags, vec![true, false, true, false]);
    }

    #[test]
    fn test_categories_in_manifest_order() {
        let manifest = Manifest::from_json(SAMPLE).unwrap();
        assert_eq!(manifest.categories(), vec!["Core", "Other", "Info"]);
    }

    #[test]
    fn test_duplicate_titles_rejected() {
        let json = r#"[{"title": "A"}, {"title": "A"}]"#;
        assert!(matches!(
            Manifest::from_json(json),
            Err(Error::ManifestInvalid(_))
        ));
    }

    #[test]
    fn test_missing_title_rejected() {
        let json = r#"[{"version": "1.0", "download": "https://x/a.dll"}]"#;
        assert!(matches!(
            Manifest::from_json(json),
            Err(Error::ManifestInvalid(_))
        ));
    }

    #[test]
    fn test_not_an_array_rejected() {
        assert!(Manifest::from_json(r#"{"title": "A"}"#).is_err());
        assert!(Manifest::from_json("not json").is_err());
    }

    #[test]
    fn test_download_without_file_name_rejected() {
        let json = r#"[{"title": "A", "download": "https://example.com/files/"}]"#;
        assert!(Manifest::from_json(json).is_err());
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(
            artifact_name("https://example.com/a/b/Mod.dll").as_deref(),
            Some("Mod.dll")
        );
        assert_eq!(
            artifact_name("https://example.com/a/pack.7z?raw=true").as_deref(),
            Some("pack.7z")
        );
        assert_eq!(artifact_name("files/Local.dll").as_deref(), Some("Local.dll"));
        assert_eq!(artifact_name("https://example.com/"), None);
        assert_eq!(artifact_name("https://example.com/a/.."), None);
    }
}
