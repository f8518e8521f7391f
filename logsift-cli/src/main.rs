//! logsift CLI -- rule table validation and log dissection

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use logsift_core::config::{GeneralConfig, LogsiftConfig};
use logsift_core::error::{ConfigError, LogsiftError};
use tracing::{debug, error};

use crate::cli::{Cli, Commands, DEFAULT_CONFIG_PATH};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let loaded = load_config(&config_path, cli.config.is_some()).await;

    // a broken config still gets default logging so `config validate` can report it
    let general = loaded
        .as_ref()
        .map(|c| c.general.clone())
        .unwrap_or_else(|_| GeneralConfig::default());
    logging::init_tracing(&general, cli.log_level.as_deref())?;

    debug!(config = %config_path.display(), "logsift starting");

    let writer = OutputWriter::new(cli.output);
    let result = match cli.command {
        Commands::Config(args) => commands::config::execute(args, &config_path, &writer).await,
        Commands::Rules(args) => match loaded {
            Ok(config) => commands::rules::execute(args, &config, &writer).await,
            Err(e) => Err(e),
        },
        Commands::Dissect(args) => match loaded {
            Ok(config) => commands::dissect::execute(args, &config, &writer).await,
            Err(e) => Err(e),
        },
    };

    if let Err(err) = result {
        error!(error = %err, "command failed");
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }

    Ok(())
}

/// An explicit `--config` must exist; the default path falls back to defaults.
async fn load_config(path: &Path, explicit: bool) -> Result<LogsiftConfig, CliError> {
    match LogsiftConfig::load(path).await {
        Ok(config) => Ok(config),
        Err(LogsiftError::Config(ConfigError::FileNotFound { .. })) if !explicit => {
            let mut config = LogsiftConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
        Err(e) => Err(e.into()),
    }
}
