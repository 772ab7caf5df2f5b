use crate::models::error::Result;
use crate::utils::directory::newest_file_timestamp;
use log::debug;
use std::path::Path;
use std::time::SystemTime;

/// Outcome of comparing a source directory with its archive directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    /// Nothing to archive. `source_exists` separates "empty" from "missing".
    NoSourceFiles { source_exists: bool },

    /// Target missing or holding no files
    FirstBackup { source_newest: SystemTime },

    SourceNewer {
        source_newest: SystemTime,
        target_newest: SystemTime,
    },

    UpToDate {
        source_newest: SystemTime,
        target_newest: SystemTime,
    },
}

impl ChangeDecision {
    /// Timestamp the new archive is named after, if one is needed
    pub fn archive_timestamp(&self) -> Option<SystemTime> {
        match self {
            ChangeDecision::FirstBackup { source_newest }
            | ChangeDecision::SourceNewer { source_newest, .. } => Some(*source_newest),
            _ => None,
        }
    }
}

/// Equal timestamps count as unchanged; coarse mtime resolution can hide an
/// edit made within the same tick.
pub fn source_is_newer(source_newest: SystemTime, target_newest: Option<SystemTime>) -> bool {
    match target_newest {
        None => true,
        Some(target) => source_newest > target,
    }
}

pub fn detect_change(source_dir: &Path, target_dir: &Path) -> Result<ChangeDecision> {
    let Some(source_newest) = newest_file_timestamp(source_dir)? else {
        return Ok(ChangeDecision::NoSourceFiles {
            source_exists: source_dir.is_dir(),
        });
    };

    // A missing target scans as empty
    let target_newest = newest_file_timestamp(target_dir)?;
    debug!(
        "Newest source file: {:?}, newest archive file: {:?}",
        source_newest, target_newest
    );

    let decision = match target_newest {
        None => ChangeDecision::FirstBackup { source_newest },
        Some(target_newest) if source_is_newer(source_newest, Some(target_newest)) => {
            ChangeDecision::SourceNewer {
                source_newest,
                target_newest,
            }
        }
        Some(target_newest) => ChangeDecision::UpToDate {
            source_newest,
            target_newest,
        },
    };

    Ok(decision)
}
