use crate::models::error::{BackupError, Result};
use crate::service::archive::ArchiveBuilder;
use log::debug;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Streams a directory into a zstd-compressed tarball
#[derive(Debug, Clone)]
pub struct TarZstdArchiver {
    level: i32,
}

impl TarZstdArchiver {
    pub fn new(level: i32) -> Self {
        TarZstdArchiver { level }
    }
}

impl ArchiveBuilder for TarZstdArchiver {
    fn extension(&self) -> &str {
        "tar.zst"
    }

    fn write_archive(
        &self,
        source: &Path,
        archive_path: &Path,
        preserve_hierarchy: bool,
    ) -> Result<()> {
        let write_error = |cause: io::Error| BackupError::ArchiveWrite {
            path: archive_path.to_path_buf(),
            cause,
        };

        let prefix = if preserve_hierarchy {
            hierarchy_prefix(source)?
        } else {
            PathBuf::new()
        };

        let file = File::create(archive_path).map_err(write_error)?;
        let encoder = zstd::Encoder::new(BufWriter::new(file), self.level).map_err(write_error)?;
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        let mut file_count = 0usize;
        for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|cause| BackupError::DirectoryWalk {
                path: source.to_path_buf(),
                cause,
            })?;
            let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
            let name = if relative.as_os_str().is_empty() {
                prefix.clone()
            } else {
                prefix.join(relative)
            };
            // Flattened archives have no entry for the source root itself
            if name.as_os_str().is_empty() {
                continue;
            }

            if entry.file_type().is_dir() {
                builder.append_dir(&name, entry.path()).map_err(write_error)?;
            } else {
                builder.append_path_with_name(entry.path(), &name).map_err(write_error)?;
                file_count += 1;
            }
        }

        let encoder = builder.into_inner().map_err(write_error)?;
        let mut writer = encoder.finish().map_err(write_error)?;
        writer.flush().map_err(write_error)?;

        debug!(
            "Archived {} files from {} at zstd level {}",
            file_count,
            source.display(),
            self.level
        );
        Ok(())
    }
}

/// Absolute source path with its root stripped, as tar entries must be relative
fn hierarchy_prefix(source: &Path) -> Result<PathBuf> {
    let absolute = fs::canonicalize(source).map_err(|cause| BackupError::Metadata {
        path: source.to_path_buf(),
        cause,
    })?;

    Ok(absolute
        .components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect())
}
