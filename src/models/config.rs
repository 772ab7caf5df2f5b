use crate::models::backup_entry::BackupEntry;
use crate::models::config_validator::validate_config;
use crate::models::error::{BackupError, Result};
use log::info;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage_location: String,
    pub directories: BTreeMap<String, String>,
    #[serde(default = "default_basename")]
    pub basename: String,
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    #[serde(default = "bool_false")]
    pub preserve_hierarchy: bool,
    #[serde(default)]
    pub archiver: ArchiverConfig,
}

/// Selects how archives are produced
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArchiverConfig {
    /// In-process tar stream compressed with zstd
    TarZstd {
        #[serde(default = "default_zstd_level")]
        level: i32,
    },

    /// Shell out to a 7-Zip compatible binary
    External {
        binary_path: String,
        #[serde(default = "default_external_format")]
        format: String,
        #[serde(default = "default_external_level")]
        level: u8,
    },
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        ArchiverConfig::TarZstd {
            level: default_zstd_level(),
        }
    }
}

impl Config {
    pub fn entries(&self) -> Vec<BackupEntry> {
        self.directories
            .iter()
            .map(|(name, source)| BackupEntry::new(name, source))
            .collect()
    }

    /// Directory that holds every archive of `entry`
    pub fn target_directory(&self, entry: &BackupEntry) -> PathBuf {
        PathBuf::from(&self.storage_location).join(&entry.name)
    }
}

fn default_basename() -> String {
    "backup".to_string()
}
fn default_timestamp_format() -> String {
    "-%Y%m%d_%H%M%S".to_string()
}
const fn bool_false() -> bool {
    false
}
const fn default_zstd_level() -> i32 {
    19
}
fn default_external_format() -> String {
    "7z".to_string()
}
const fn default_external_level() -> u8 {
    9
}

pub fn setup_config(config_file: String) -> Result<Config> {
    let config_path = PathBuf::from(config_file);
    info!("Loading config from: {}", config_path.display());

    let config_str = fs::read_to_string(&config_path).map_err(|cause| {
        BackupError::ConfigRead {
            path: config_path.clone(),
            cause,
        }
    })?;

    let config: Config = serde_json::from_str(&config_str).map_err(|cause| {
        BackupError::ConfigParse {
            path: config_path,
            cause,
        }
    })?;

    validate_config(&config)?;

    Ok(config)
}
