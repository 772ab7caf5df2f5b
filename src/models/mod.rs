pub mod backup_entry;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod run_report;
