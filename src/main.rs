mod models;
mod service;
mod utils;

use crate::models::config::{setup_config, Config};
use crate::service::archive::archiver_for;
use crate::service::backup::{run_backups, RunOptions};
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info};

#[derive(Parser)]
#[command(name = "RustyArchiveBackUp")]
#[command(about = "Archives directories whenever their files change", long_about = None)]
struct Cli {
    #[arg(
        short = 'c',
        long = "config",
        default_value = "config.json",
        env = "RUSTYARCHIVEBACKUP_CONFIG"
    )]
    config_file: String,

    #[arg(
        short = 'l',
        long = "log-level",
        default_value = "info",
        env = "LOG_LEVEL"
    )]
    log_level: String,

    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    #[arg(short = 'v', long = "validate-only")]
    validate_only: bool,

    #[arg(short = 'd', long = "dry-run")]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp_secs()
        .init();

    info!("RustyArchiveBackUp starting...");
    // Strip any surrounding quotes from config file path
    let config_file = args
        .config_file
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    let config: Config = setup_config(config_file).context("Failed to load configuration")?;
    debug!("Loaded config: {:?}", &config);

    if args.validate_only {
        info!("Configuration is valid. Exiting (--validate-only mode).");
        return Ok(());
    }

    if args.dry_run {
        info!("Running in DRY RUN mode - changes are detected but nothing is written");
    }

    let builder = archiver_for(&config.archiver);
    let report = run_backups(
        &config,
        builder.as_ref(),
        RunOptions {
            dry_run: args.dry_run,
            quiet: args.quiet,
        },
    );

    // Each failure was already logged by the runner
    if report.has_failures() {
        bail!(
            "{} of {} backups failed",
            report.failures().len(),
            report.outcomes.len()
        );
    }

    Ok(())
}
