//! Error taxonomy for manifest ingestion, reconciliation and state persistence

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort an operation as a whole
#[derive(Debug, Error)]
pub enum Error {
    /// The manifest could not be retrieved
    #[error("failed to load manifest: {0}")]
    ManifestUnavailable(String),

    /// The manifest was retrieved but is not usable
    #[error("manifest is invalid: {0}")]
    ManifestInvalid(String),

    /// The configured game directory does not exist or is not a directory
    #[error("game directory is invalid: {}", .0.display())]
    GameDirectoryInvalid(PathBuf),

    /// The installed-state record could not be written
    #[error("failed to save installed state to {}: {cause}", .path.display())]
    StatePersistence { path: PathBuf, cause: String },
}

/// A failure scoped to a single mod title. Never aborts a reconciliation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TitleError {
    #[error("{title}: download failed: {cause}")]
    DownloadFailed { title: String, cause: String },

    #[error("{title}: extraction failed: {cause}")]
    ExtractionFailed { title: String, cause: String },

    #[error("{title}: filesystem error: {cause}")]
    FilesystemFailed { title: String, cause: String },
}

impl TitleError {
    pub fn title(&self) -> &str {
        match self {
            TitleError::DownloadFailed { title, .. }
            | TitleError::ExtractionFailed { title, .. }
            | TitleError::FilesystemFailed { title, .. } => title,
        }
    }

    /// Short reason without the title prefix, for summaries
    pub fn reason(&self) -> String {
        match self {
            TitleError::DownloadFailed { cause, .. } => format!("download failed: {}", cause),
            TitleError::ExtractionFailed { cause, .. } => format!("extraction failed: {}", cause),
            TitleError::FilesystemFailed { cause, .. } => format!("filesystem error: {}", cause),
        }
    }
}
