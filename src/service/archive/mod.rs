pub mod external;
pub mod tar_zstd;

use crate::models::config::{ArchiverConfig, Config};
use crate::models::error::{BackupError, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use external::ExternalArchiver;
use log::debug;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tar_zstd::TarZstdArchiver;

/// A strategy that turns a directory into a single compressed file
pub trait ArchiveBuilder {
    /// File extension without the leading dot, e.g. `tar.zst`
    fn extension(&self) -> &str;

    /// Writes the full contents of `source` to `archive_path`, replacing any
    /// existing file there. With `preserve_hierarchy` the entries keep the
    /// source's absolute directory prefix.
    fn write_archive(
        &self,
        source: &Path,
        archive_path: &Path,
        preserve_hierarchy: bool,
    ) -> Result<()>;
}

pub fn archiver_for(config: &ArchiverConfig) -> Box<dyn ArchiveBuilder> {
    match config {
        ArchiverConfig::TarZstd { level } => Box::new(TarZstdArchiver::new(*level)),
        ArchiverConfig::External {
            binary_path,
            format,
            level,
        } => Box::new(ExternalArchiver::new(binary_path, format, *level)),
    }
}

/// Renders `timestamp` in local time with a strftime pattern
pub fn format_timestamp(timestamp: SystemTime, format: &str) -> Result<String> {
    let format_error = || BackupError::TimestampFormat {
        format: format.to_string(),
    };

    let items: Vec<Item> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(format_error());
    }

    let local: DateTime<Local> = timestamp.into();
    let mut rendered = String::new();
    write!(rendered, "{}", local.format_with_items(items.iter())).map_err(|_| format_error())?;
    Ok(rendered)
}

pub fn archive_file_name(
    basename: &str,
    newest: SystemTime,
    timestamp_format: &str,
    extension: &str,
) -> Result<String> {
    let stamp = format_timestamp(newest, timestamp_format)?;
    Ok(format!("{}{}.{}", basename, stamp, extension))
}

/// Where the archive for `newest` would land, without touching the disk
pub fn archive_path(
    builder: &dyn ArchiveBuilder,
    config: &Config,
    target_dir: &Path,
    newest: SystemTime,
) -> Result<PathBuf> {
    let name = archive_file_name(
        &config.basename,
        newest,
        &config.timestamp_format,
        builder.extension(),
    )?;
    Ok(target_dir.join(name))
}

/// Modification time written to a new archive for a source whose newest file
/// is `newest`.
///
/// Rounded up to an even second: FAT keeps 2 s, other filesystems whole
/// seconds, and a stored value below `newest` would make the source look newer
/// on every later run.
pub fn archive_mtime(newest: SystemTime) -> SystemTime {
    let Ok(since_epoch) = newest.duration_since(UNIX_EPOCH) else {
        return newest;
    };
    let mut secs = since_epoch.as_secs();
    if since_epoch.subsec_nanos() > 0 {
        secs += 1;
    }
    secs += secs % 2;
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// Creates `target_dir` if needed and writes a new archive of `source` into it.
///
/// The archive's mtime is set from `newest` (see [`archive_mtime`]) so the
/// next scan of `target_dir` does not see an unchanged source as newer.
pub fn create_archive(
    builder: &dyn ArchiveBuilder,
    config: &Config,
    source: &Path,
    target_dir: &Path,
    newest: SystemTime,
) -> Result<PathBuf> {
    fs::create_dir_all(target_dir).map_err(|cause| BackupError::CreateDirectory {
        path: target_dir.to_path_buf(),
        cause,
    })?;

    let archive = archive_path(builder, config, target_dir, newest)?;
    debug!("Writing {} -> {}", source.display(), archive.display());
    builder.write_archive(source, &archive, config.preserve_hierarchy)?;

    File::options()
        .write(true)
        .open(&archive)
        .and_then(|file| file.set_modified(archive_mtime(newest)))
        .map_err(|cause| BackupError::ArchiveWrite {
            path: archive.clone(),
            cause,
        })?;

    Ok(archive)
}
