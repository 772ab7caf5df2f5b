use crate::models::error::{BackupError, Result};
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

/// Returns the newest modification time of any file below `dir`.
///
/// A missing directory and a directory without files both yield `None`.
/// Symlinked directories are not descended into; a symlink to a file counts
/// with the modification time of its target.
pub fn newest_file_timestamp(dir: &Path) -> Result<Option<SystemTime>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut newest: Option<SystemTime> = None;
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|cause| BackupError::DirectoryWalk {
            path: dir.to_path_buf(),
            cause,
        })?;
        if entry.file_type().is_dir() {
            continue;
        }

        let metadata = if entry.path_is_symlink() {
            match fs::metadata(entry.path()) {
                Ok(resolved) => resolved,
                // Broken link
                Err(_) => continue,
            }
        } else {
            entry.metadata().map_err(|cause| BackupError::DirectoryWalk {
                path: entry.path().to_path_buf(),
                cause,
            })?
        };
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata.modified().map_err(|cause| BackupError::Metadata {
            path: entry.path().to_path_buf(),
            cause,
        })?;
        newest = newest.max(Some(modified));
    }

    Ok(newest)
}
