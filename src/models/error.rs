use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Failed to read config file '{path}': {cause}")]
    ConfigRead { path: PathBuf, cause: io::Error },

    #[error("Failed to parse config file '{path}': {cause}")]
    ConfigParse {
        path: PathBuf,
        cause: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to walk directory '{path}': {cause}")]
    DirectoryWalk {
        path: PathBuf,
        cause: walkdir::Error,
    },

    #[error("Failed to get metadata for '{path}': {cause}")]
    Metadata { path: PathBuf, cause: io::Error },

    #[error("Failed to create directory '{path}': {cause}")]
    CreateDirectory { path: PathBuf, cause: io::Error },

    #[error("Failed to write archive '{path}': {cause}")]
    ArchiveWrite { path: PathBuf, cause: io::Error },

    #[error("Invalid timestamp format '{format}'")]
    TimestampFormat { format: String },

    #[error("Failed to start archiver '{binary}': {cause}")]
    ArchiverSpawn { binary: PathBuf, cause: io::Error },

    #[error("Archiver '{binary}' exited with status {}", exit_status(.code))]
    ArchiverFailed { binary: PathBuf, code: Option<i32> },

    #[error("Archiver '{binary}' reported success but '{archive}' was not written")]
    ArchiverNoOutput { binary: PathBuf, archive: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown (terminated by signal)".to_string(),
    }
}
