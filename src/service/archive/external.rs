use crate::models::error::{BackupError, Result};
use crate::service::archive::ArchiveBuilder;
use log::{debug, warn};
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Delegates compression to a 7-Zip compatible command line tool.
///
/// Only the exit status is interpreted; output is passed to the log.
#[derive(Debug, Clone)]
pub struct ExternalArchiver {
    binary: PathBuf,
    format: String,
    level: u8,
}

impl ExternalArchiver {
    pub fn new(binary: &str, format: &str, level: u8) -> Self {
        ExternalArchiver {
            binary: PathBuf::from(binary),
            format: format.to_string(),
            level,
        }
    }

    fn arguments(
        &self,
        source: &Path,
        archive_path: &Path,
        preserve_hierarchy: bool,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "a".into(),
            format!("-t{}", self.format).into(),
            format!("-mx={}", self.level).into(),
            "-y".into(),
        ];
        if preserve_hierarchy {
            // Full paths without the drive letter
            args.push("-spf2".into());
        }
        args.push(archive_path.as_os_str().to_owned());
        if preserve_hierarchy {
            args.push(source.as_os_str().to_owned());
        } else {
            // The archiver expands the wildcard itself, so entries are relative to `source`
            args.push(source.join("*").into_os_string());
        }
        args
    }
}

impl ArchiveBuilder for ExternalArchiver {
    fn extension(&self) -> &str {
        &self.format
    }

    fn write_archive(
        &self,
        source: &Path,
        archive_path: &Path,
        preserve_hierarchy: bool,
    ) -> Result<()> {
        // `a` would update an existing archive in place instead of replacing it
        match fs::remove_file(archive_path) {
            Ok(()) => debug!("Replacing existing archive {}", archive_path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(cause) => {
                return Err(BackupError::ArchiveWrite {
                    path: archive_path.to_path_buf(),
                    cause,
                })
            }
        }

        let args = self.arguments(source, archive_path, preserve_hierarchy);
        debug!("Running {} {:?}", self.binary.display(), args);

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|cause| BackupError::ArchiverSpawn {
                binary: self.binary.clone(),
                cause,
            })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!("{}: {}", self.binary.display(), line);
        }

        if !output.status.success() {
            for line in String::from_utf8_lossy(&output.stderr).lines() {
                warn!("{}: {}", self.binary.display(), line);
            }
            return Err(BackupError::ArchiverFailed {
                binary: self.binary.clone(),
                code: output.status.code(),
            });
        }

        if !archive_path.is_file() {
            return Err(BackupError::ArchiverNoOutput {
                binary: self.binary.clone(),
                archive: archive_path.to_path_buf(),
            });
        }

        Ok(())
    }
}
