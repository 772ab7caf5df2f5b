use crate::models::config::{ArchiverConfig, Config};
use crate::models::error::{BackupError, Result};
use crate::service::archive::format_timestamp;
use chrono::format::{Item, StrftimeItems};
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

/// 2023-11-14T22:13:20Z, an arbitrary instant to render timestamp formats with
const SAMPLE_SECS: u64 = 1_700_000_000;

/// Validates the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    info!("Validating configuration...");

    validate_storage_location(&config.storage_location)?;

    validate_directories(&config.directories)?;

    validate_archive_naming(&config.basename, &config.timestamp_format)?;

    validate_archiver(&config.archiver)?;

    info!("Configuration validation passed");
    Ok(())
}

fn validate_storage_location(storage_location: &str) -> Result<()> {
    if storage_location.trim().is_empty() {
        return Err(BackupError::InvalidConfig(
            "storage_location must not be empty".to_string(),
        ));
    }

    let path = Path::new(storage_location);
    if !path.exists() {
        warn!(
            "Storage location does not exist but will be created: {}",
            storage_location
        );
    } else if !path.is_dir() {
        return Err(BackupError::InvalidConfig(format!(
            "storage_location exists but is not a directory: {}",
            storage_location
        )));
    }

    Ok(())
}

/// Validate the name → source directory mapping
fn validate_directories(directories: &BTreeMap<String, String>) -> Result<()> {
    if directories.is_empty() {
        return Err(BackupError::InvalidConfig(
            "At least one entry must be configured in directories".to_string(),
        ));
    }

    for (name, source) in directories {
        if name.trim().is_empty() || name == "." || name == ".." {
            return Err(BackupError::InvalidConfig(format!(
                "Backup name '{}' cannot be used as a directory name",
                name
            )));
        }

        if contains_separator(name) {
            return Err(BackupError::InvalidConfig(format!(
                "Backup name '{}' must not contain a path separator",
                name
            )));
        }

        if source.trim().is_empty() {
            return Err(BackupError::InvalidConfig(format!(
                "Backup '{}' has an empty source directory",
                name
            )));
        }

        let path = Path::new(source);
        if !path.exists() {
            // Reported at run time as "no files to back up"
            warn!("Source directory for '{}' does not exist: {}", name, source);
        } else if !path.is_dir() {
            return Err(BackupError::InvalidConfig(format!(
                "Source for '{}' is not a directory: {}",
                name, source
            )));
        }
    }

    Ok(())
}

fn validate_archive_naming(basename: &str, timestamp_format: &str) -> Result<()> {
    if basename.is_empty() {
        return Err(BackupError::InvalidConfig(
            "basename must not be empty".to_string(),
        ));
    }

    if contains_separator(basename) {
        return Err(BackupError::InvalidConfig(format!(
            "basename '{}' must not contain a path separator",
            basename
        )));
    }

    if StrftimeItems::new(timestamp_format).any(|item| matches!(item, Item::Error)) {
        return Err(BackupError::InvalidConfig(format!(
            "timestamp_format '{}' is not a valid strftime pattern\nExample: '-%Y%m%d_%H%M%S'",
            timestamp_format
        )));
    }

    // Specifiers such as %D render a separator even when the pattern has none
    let sample = UNIX_EPOCH + Duration::from_secs(SAMPLE_SECS);
    let rendered = format_timestamp(sample, timestamp_format)?;
    if contains_separator(&rendered) {
        return Err(BackupError::InvalidConfig(format!(
            "timestamp_format '{}' must not produce a path separator (renders as '{}')",
            timestamp_format, rendered
        )));
    }

    // Archives one second apart must get different names or the older one is replaced
    let next = format_timestamp(sample + Duration::from_secs(1), timestamp_format)?;
    if rendered == next {
        return Err(BackupError::InvalidConfig(format!(
            "timestamp_format '{}' must change every second so archives are never overwritten\nExample: '-%Y%m%d_%H%M%S'",
            timestamp_format
        )));
    }

    Ok(())
}

fn validate_archiver(archiver: &ArchiverConfig) -> Result<()> {
    match archiver {
        ArchiverConfig::TarZstd { level } => {
            if !(1..=22).contains(level) {
                return Err(BackupError::InvalidConfig(format!(
                    "zstd level must be between 1 and 22, got {}",
                    level
                )));
            }
        }
        ArchiverConfig::External {
            binary_path,
            format,
            level,
        } => {
            if binary_path.trim().is_empty() {
                return Err(BackupError::InvalidConfig(
                    "External archiver needs a binary_path".to_string(),
                ));
            }
            if format.trim().is_empty() || contains_separator(format) {
                return Err(BackupError::InvalidConfig(format!(
                    "External archiver format '{}' is not usable as a file extension",
                    format
                )));
            }
            if *level > 9 {
                return Err(BackupError::InvalidConfig(format!(
                    "External archiver level must be between 0 and 9, got {}",
                    level
                )));
            }

            let binary = Path::new(binary_path);
            if binary.components().count() > 1 && !binary.is_file() {
                warn!("External archiver binary not found: {}", binary_path);
            }
        }
    }

    Ok(())
}

fn contains_separator(value: &str) -> bool {
    value.contains('/') || value.contains('\\')
}
