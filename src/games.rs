//! Game install detection and directory layout

use crate::error::Error;
use std::path::{Path, PathBuf};

/// Folder name of the game under `steamapps/common`
pub const GAME_FOLDER: &str = "Capuchin";

/// Directory layout of a game install with BepInEx
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLayout {
    root: PathBuf,
}

impl GameLayout {
    /// Validate `root` as a game directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::GameDirectoryInvalid(root));
        }
        Ok(Self { root })
    }

    /// Game root; receives the runtime's own tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shared plugin directory: `<game>/BepInEx/plugins`
    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join("BepInEx").join("plugins")
    }
}

/// Locate the game, preferring an explicit directory
pub fn resolve_game_dir(configured: Option<PathBuf>) -> Option<PathBuf> {
    configured.or_else(detect_game_dir)
}

/// Scan known Steam libraries for the game
pub fn detect_game_dir() -> Option<PathBuf> {
    for steamapps in find_steam_libraries() {
        let candidate = steamapps.join("common").join(GAME_FOLDER);
        if candidate.is_dir() {
            tracing::debug!("Detected game at {}", candidate.display());
            return Some(candidate);
        }
    }

    default_game_dir().filter(|p| p.is_dir())
}

/// Stock Steam install location on Windows
#[cfg(windows)]
fn default_game_dir() -> Option<PathBuf> {
    Some(PathBuf::from(r"C:\Program Files (x86)\Steam\steamapps\common").join(GAME_FOLDER))
}

#[cfg(not(windows))]
fn default_game_dir() -> Option<PathBuf> {
    None
}

/// Find all Steam library folders
fn find_steam_libraries() -> Vec<PathBuf> {
    let mut libraries = Vec::new();

    let home = directories::BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_default();
    let possible_paths = [
        home.join(".steam/steam"),
        home.join(".local/share/Steam"),
        PathBuf::from("/usr/share/steam"),
    ];

    for base in possible_paths {
        let steamapps = base.join("steamapps");
        if !steamapps.exists() {
            continue;
        }
        if !libraries.contains(&steamapps) {
            libraries.push(steamapps.clone());
        }

        // Additional libraries
        if let Ok(content) = std::fs::read_to_string(steamapps.join("libraryfolders.vdf")) {
            for lib_path in parse_library_folders(&content) {
                if lib_path.exists() && !libraries.contains(&lib_path) {
                    libraries.push(lib_path);
                }
            }
        }
    }

    libraries
}

/// Extract `steamapps` paths from a `libraryfolders.vdf` document
fn parse_library_folders(content: &str) -> Vec<PathBuf> {
    content
        .lines()
        .filter(|line| line.contains("\"path\""))
        .filter_map(|line| line.split('"').nth(3))
        .map(|path| PathBuf::from(path.replace("\\\\", "\\")).join("steamapps"))
        .collect()
}
