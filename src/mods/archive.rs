//! Materializing downloaded artifacts: archive extraction (zip, 7z) or plain copy

use crate::error::TitleError;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
}

impl ArchiveFormat {
    /// Detect format from a file name's extension
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "zip" => Some(Self::Zip),
            "7z" => Some(Self::SevenZip),
            _ => None,
        }
    }
}

/// What [`materialize`] did with an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    /// Archive contents were merged into the target
    Extracted { files: usize },
    /// The artifact was copied into the target as-is
    Copied { path: PathBuf },
}

/// Failure to materialize an artifact
#[derive(Debug)]
pub enum MaterializeError {
    Extraction(anyhow::Error),
    Filesystem(anyhow::Error),
}

impl MaterializeError {
    pub fn for_title(self, title: &str) -> TitleError {
        match self {
            MaterializeError::Extraction(e) => TitleError::ExtractionFailed {
                title: title.to_string(),
                cause: format!("{:#}", e),
            },
            MaterializeError::Filesystem(e) => TitleError::FilesystemFailed {
                title: title.to_string(),
                cause: format!("{:#}", e),
            },
        }
    }
}

/// Place the staged artifact `source` (named `file_name`) into `target_dir`.
///
/// Archives are extracted into a scratch directory beside `source` first, so
/// a corrupt archive leaves `target_dir` untouched. Anything else is copied
/// under `file_name`, replacing an existing file of that name.
pub fn materialize(
    source: &Path,
    file_name: &str,
    target_dir: &Path,
) -> std::result::Result<Materialized, MaterializeError> {
    match ArchiveFormat::from_file_name(file_name) {
        Some(format) => {
            let files = extract_into(source, format, target_dir)
                .map_err(MaterializeError::Extraction)?;
            Ok(Materialized::Extracted { files })
        }
        None => {
            let path = copy_into(source, file_name, target_dir)
                .map_err(MaterializeError::Filesystem)?;
            Ok(Materialized::Copied { path })
        }
    }
}

fn copy_into(source: &Path, file_name: &str, target_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(target_dir)
        .with_context(|| format!("Failed to create {}", target_dir.display()))?;

    let dest = target_dir.join(file_name);
    std::fs::copy(source, &dest)
        .with_context(|| format!("Failed to copy into {}", dest.display()))?;
    Ok(dest)
}

fn extract_into(archive: &Path, format: ArchiveFormat, target_dir: &Path) -> Result<usize> {
    let scratch_parent = archive
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    let scratch = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(&scratch_parent)
        .context("Failed to create extraction directory")?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive, scratch.path())?,
        ArchiveFormat::SevenZip => extract_7z(archive, scratch.path())?,
    }

    merge_tree(scratch.path(), target_dir)
}

/// Extract a ZIP archive
fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(archive).context("Failed to open archive")?;
    let mut zip = zip::ZipArchive::new(file).context("Failed to read ZIP archive")?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let relative = sanitize_path(entry.name());
        if relative.is_empty() {
            continue;
        }
        let outpath = dest.join(&relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut outfile = std::fs::File::create(&outpath)?;
            std::io::copy(&mut entry, &mut outfile)
                .with_context(|| format!("Failed to extract {}", relative))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
                }
            }
        }
    }

    Ok(())
}

/// Extract a 7z archive
fn extract_7z(archive: &Path, dest: &Path) -> Result<()> {
    sevenz_rust::decompress_file_with_extract_fn(archive, dest, |entry, reader, _| {
        let relative = sanitize_path(entry.name());
        if relative.is_empty() {
            return Ok(true);
        }
        sevenz_rust::default_entry_extract_fn(entry, reader, &dest.join(relative))
    })
    .context("Failed to extract 7z archive")
}

/// Copy every file under `from` into `to`, keeping relative paths.
/// Returns the number of files written.
fn merge_tree(from: &Path, to: &Path) -> Result<usize> {
    std::fs::create_dir_all(to).with_context(|| format!("Failed to create {}", to.display()))?;

    let mut files = 0;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.context("Failed to walk extracted tree")?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .context("Extracted entry escaped extraction directory")?;
        let dest = to.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest)
                .with_context(|| format!("Failed to create {}", dest.display()))?;
        } else if entry.file_type().is_file() {
            if dest.is_dir() {
                bail!("{} exists as a directory", dest.display());
            }
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &dest)
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            files += 1;
        }
    }

    Ok(files)
}

/// Sanitize path to prevent directory traversal
fn sanitize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// Write a zip archive with the given `(name, contents)` entries
#[cfg(test)]
pub(crate) fn write_test_zip(path: &Path, entries: &[(&str, &[u8])]) {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, contents) in entries {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap();
}

/// Write a 7z archive with the given `(name, contents)` entries
#[cfg(test)]
pub(crate) fn write_test_7z(path: &Path, entries: &[(&str, &[u8])]) {
    let sources = tempfile::tempdir().unwrap();
    let mut writer = sevenz_rust::SevenZWriter::create(path).unwrap();
    for (i, (name, contents)) in entries.iter().enumerate() {
        let source = sources.path().join(i.to_string());
        std::fs::write(&source, contents).unwrap();
        let entry = sevenz_rust::SevenZArchiveEntry::from_path(&source, name.to_string());
        writer
            .push_archive_entry(entry, Some(std::fs::File::open(&source).unwrap()))
            .unwrap();
    }
    writer.finish().unwrap();
}
