use crate::models::backup_entry::BackupEntry;
use crate::models::config::Config;
use crate::models::error::Result;
use crate::models::run_report::{EntryOutcome, RunReport};
use crate::service::archive::{archive_path, create_archive, ArchiveBuilder};
use crate::service::change::{detect_change, ChangeDecision};
use crate::utils::progress::{create_spinner, format_bytes};
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use std::fs;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Detect changes but write nothing
    pub dry_run: bool,

    /// No spinner while archiving
    pub quiet: bool,
}

/// Checks every configured entry in order and archives the ones that changed.
///
/// A failing entry is logged and recorded; the remaining entries still run.
pub fn run_backups(
    config: &Config,
    builder: &dyn ArchiveBuilder,
    options: RunOptions,
) -> RunReport {
    let mut report = RunReport::default();

    info!("Checking backups:");
    for entry in config.entries() {
        info!("  \"{}\"", entry.name);
        let outcome = match backup_entry(config, builder, &entry, options) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("    Backup of \"{}\" failed: {}", entry.name, e);
                EntryOutcome::Failed(e.to_string())
            }
        };
        report.record(&entry.name, outcome);
    }

    let failed = report.failures().len();
    if failed > 0 {
        warn!("{} of {} backups failed", failed, report.outcomes.len());
    } else if options.dry_run {
        info!("DRY RUN completed - no directories or archives were written");
    } else {
        info!(
            "Backup run completed - {} new archive(s)",
            report.created().len()
        );
    }

    report
}

fn backup_entry(
    config: &Config,
    builder: &dyn ArchiveBuilder,
    entry: &BackupEntry,
    options: RunOptions,
) -> Result<EntryOutcome> {
    let target = config.target_directory(entry);
    let decision = detect_change(&entry.source_path, &target)?;

    match decision {
        ChangeDecision::NoSourceFiles { source_exists } => {
            info!("    There are no files in the source directory to back up");
            info!("    Source directory: {}", entry.source_path.display());
            if !source_exists {
                warn!("    Directory doesn't exist.");
            }
        }
        ChangeDecision::UpToDate {
            source_newest,
            target_newest,
        } => {
            debug!(
                "    Newest source file {} is not newer than newest archive {}",
                local_display(source_newest),
                local_display(target_newest)
            );
            info!("    Up to date");
        }
        ChangeDecision::FirstBackup { .. } => info!("    This is the first backup"),
        ChangeDecision::SourceNewer {
            source_newest,
            target_newest,
        } => info!(
            "    Changed since last backup ({} > {})",
            local_display(source_newest),
            local_display(target_newest)
        ),
    }

    let Some(newest) = decision.archive_timestamp() else {
        return Ok(match decision {
            ChangeDecision::NoSourceFiles { .. } => EntryOutcome::NoSourceFiles,
            _ => EntryOutcome::UpToDate,
        });
    };

    if options.dry_run {
        let archive = archive_path(builder, config, &target, newest)?;
        info!("  Would create {}", archive.display());
        return Ok(EntryOutcome::WouldCreate(archive));
    }

    info!("  Creating new backup...");
    let spinner = if options.quiet {
        None
    } else {
        Some(create_spinner(&format!("Archiving \"{}\"", entry.name)))
    };

    let result = create_archive(builder, config, &entry.source_path, &target, newest);

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let archive = result?;

    let size = fs::metadata(&archive).map(|m| m.len()).unwrap_or(0);
    info!("  Backup created: {} ({})", archive.display(), format_bytes(size));
    Ok(EntryOutcome::Created(archive))
}

fn local_display(timestamp: SystemTime) -> String {
    let local: DateTime<Local> = timestamp.into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::ArchiverConfig;
    use crate::service::archive::tar_zstd::TarZstdArchiver;
    use crate::utils::directory::test_support::{at, write_file_at};
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use std::fs::File;
    use std::io::Read;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    const QUIET: RunOptions = RunOptions {
        dry_run: false,
        quiet: true,
    };

    fn local_time(y: i32, mo: u32, d: u32) -> SystemTime {
        Local
            .with_ymd_and_hms(y, mo, d, 0, 0, 0)
            .earliest()
            .unwrap()
            .into()
    }

    fn config_for(storage: &Path, directories: &[(&str, &Path)]) -> Config {
        let directories: BTreeMap<String, String> = directories
            .iter()
            .map(|(name, path)| (name.to_string(), path.to_str().unwrap().to_string()))
            .collect();
        Config {
            storage_location: storage.to_str().unwrap().to_string(),
            directories,
            basename: "backup".to_string(),
            timestamp_format: "-%Y%m%d_%H%M%S".to_string(),
            preserve_hierarchy: false,
            archiver: ArchiverConfig::TarZstd { level: 3 },
        }
    }

    fn archives_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn archived_files(archive: &Path) -> Vec<(String, String)> {
        let decoder = zstd::Decoder::new(File::open(archive).unwrap()).unwrap();
        let mut tarball = tar::Archive::new(decoder);
        let mut files = Vec::new();
        for entry in tarball.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.header().entry_type().is_dir() {
                continue;
            }
            let name = entry.path().unwrap().to_string_lossy().to_string();
            let mut contents = String::new();
            entry.read_to_string(&mut contents).unwrap();
            files.push((name, contents));
        }
        files
    }

    #[test]
    fn test_first_backup_creates_target_and_archive() {
        let src = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        write_file_at(&src.path().join("save1.dat"), b"level 1", local_time(2024, 1, 1));
        let config = config_for(storage.path(), &[("A", src.path())]);
        let builder = TarZstdArchiver::new(3);

        let report = run_backups(&config, &builder, QUIET);

        let target = storage.path().join("A");
        let expected = target.join("backup-20240101_000000.tar.zst");
        assert!(target.is_dir());
        assert_eq!(report.outcome_for("A"), Some(&EntryOutcome::Created(expected.clone())));
        assert_eq!(
            archived_files(&expected),
            vec![("save1.dat".to_string(), "level 1".to_string())]
        );
    }

    #[test]
    fn test_second_run_without_changes_creates_nothing() {
        let src = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        write_file_at(&src.path().join("save1.dat"), b"level 1", at(1_600_000_000));
        let config = config_for(storage.path(), &[("A", src.path())]);
        let builder = TarZstdArchiver::new(3);

        let first = run_backups(&config, &builder, QUIET);
        let second = run_backups(&config, &builder, QUIET);

        assert_eq!(first.created().len(), 1);
        assert!(second.created().is_empty());
        assert_eq!(second.outcome_for("A"), Some(&EntryOutcome::UpToDate));
        assert_eq!(archives_in(&storage.path().join("A")).len(), 1);
    }

    #[test]
    fn test_sub_second_source_mtime_is_archived_once() {
        let src = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        let modified = at(1_600_000_001) + Duration::from_millis(700);
        write_file_at(&src.path().join("save1.dat"), b"level 1", modified);
        let config = config_for(storage.path(), &[("A", src.path())]);
        let builder = TarZstdArchiver::new(3);

        let first = run_backups(&config, &builder, QUIET);
        let second = run_backups(&config, &builder, QUIET);

        assert_eq!(first.created().len(), 1);
        assert_eq!(second.outcome_for("A"), Some(&EntryOutcome::UpToDate));
        assert_eq!(archives_in(&storage.path().join("A")).len(), 1);
    }

    #[test]
    fn test_new_file_adds_second_archive_and_keeps_first() {
        let src = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        write_file_at(&src.path().join("save1.dat"), b"level 1", local_time(2024, 1, 1));
        let config = config_for(storage.path(), &[("A", src.path())]);
        let builder = TarZstdArchiver::new(3);

        run_backups(&config, &builder, QUIET);
        let target = storage.path().join("A");
        let first_archive = target.join("backup-20240101_000000.tar.zst");
        let first_bytes = fs::read(&first_archive).unwrap();

        write_file_at(&src.path().join("save2.dat"), b"level 2", local_time(2024, 1, 2));
        let report = run_backups(&config, &builder, QUIET);

        let second_archive = target.join("backup-20240102_000000.tar.zst");
        assert_eq!(
            report.outcome_for("A"),
            Some(&EntryOutcome::Created(second_archive.clone()))
        );
        assert_eq!(
            archives_in(&target),
            vec![
                "backup-20240101_000000.tar.zst".to_string(),
                "backup-20240102_000000.tar.zst".to_string(),
            ]
        );
        assert_eq!(fs::read(&first_archive).unwrap(), first_bytes);
        assert_eq!(archived_files(&second_archive).len(), 2);
    }

    #[test]
    fn test_empty_source_creates_no_target() {
        let src = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        let config = config_for(storage.path(), &[("A", src.path())]);
        let builder = TarZstdArchiver::new(3);

        let report = run_backups(&config, &builder, QUIET);

        assert_eq!(report.outcome_for("A"), Some(&EntryOutcome::NoSourceFiles));
        assert!(!storage.path().join("A").exists());
        assert!(!report.has_failures());
    }

    #[test]
    fn test_missing_source_is_not_a_failure() {
        let storage = TempDir::new().unwrap();
        let missing = storage.path().join("gone");
        let config = config_for(storage.path(), &[("A", missing.as_path())]);
        let builder = TarZstdArchiver::new(3);

        let report = run_backups(&config, &builder, QUIET);

        assert_eq!(report.outcome_for("A"), Some(&EntryOutcome::NoSourceFiles));
        assert!(!report.has_failures());
    }

    #[test]
    fn test_failing_entry_does_not_stop_the_run() {
        let broken_src = TempDir::new().unwrap();
        let good_src = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        write_file_at(&broken_src.path().join("x.dat"), b"x", at(1_000));
        write_file_at(&good_src.path().join("y.dat"), b"y", at(2_000));
        // A plain file where the archive directory should go
        write_file_at(&storage.path().join("a-broken"), b"in the way", at(10));
        let config = config_for(
            storage.path(),
            &[("a-broken", broken_src.path()), ("b-good", good_src.path())],
        );
        let builder = TarZstdArchiver::new(3);

        let report = run_backups(&config, &builder, QUIET);

        assert!(report.has_failures());
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].0, "a-broken");
        assert!(matches!(
            report.outcome_for("b-good"),
            Some(EntryOutcome::Created(_))
        ));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let src = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        write_file_at(&src.path().join("save1.dat"), b"level 1", local_time(2024, 1, 1));
        let config = config_for(storage.path(), &[("A", src.path())]);
        let builder = TarZstdArchiver::new(3);

        let report = run_backups(
            &config,
            &builder,
            RunOptions {
                dry_run: true,
                quiet: true,
            },
        );

        let expected: PathBuf = storage
            .path()
            .join("A")
            .join("backup-20240101_000000.tar.zst");
        assert_eq!(report.outcome_for("A"), Some(&EntryOutcome::WouldCreate(expected)));
        assert!(!storage.path().join("A").exists());
    }

    #[test]
    fn test_entries_are_independent() {
        let changed = TempDir::new().unwrap();
        let unchanged = TempDir::new().unwrap();
        let storage = TempDir::new().unwrap();
        write_file_at(&changed.path().join("a.dat"), b"a", at(1_000));
        write_file_at(&unchanged.path().join("b.dat"), b"b", at(1_000));
        let config = config_for(
            storage.path(),
            &[("changed", changed.path()), ("unchanged", unchanged.path())],
        );
        let builder = TarZstdArchiver::new(3);
        run_backups(&config, &builder, QUIET);

        write_file_at(&changed.path().join("a.dat"), b"a2", at(5_000));
        let report = run_backups(&config, &builder, QUIET);

        assert!(matches!(
            report.outcome_for("changed"),
            Some(EntryOutcome::Created(_))
        ));
        assert_eq!(report.outcome_for("unchanged"), Some(&EntryOutcome::UpToDate));
    }
}
