use std::path::PathBuf;

/// One named source directory; `name` doubles as the archive subdirectory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub name: String,
    pub source_path: PathBuf,
}

impl BackupEntry {
    pub fn new(name: &str, source_path: &str) -> Self {
        BackupEntry {
            name: name.to_string(),
            source_path: PathBuf::from(source_path),
        }
    }
}
