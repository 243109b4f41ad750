//! leo-setup - build and cache the Leo compiler in CI
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use leo_setup::cli::{Cli, Commands};
use leo_setup::config::{Config, ConfigManager};
use leo_setup::error::{SetupError, SetupResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{} [{}] {}",
                style("Error:").red().bold(),
                e.stage(),
                e
            );
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> SetupResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Find local config unless --no-local is set
    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| SetupError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    init_logging(cli.verbose, &config);
    if let Some(ref path) = local_config_path {
        debug!("Merged local config: {}", path.display());
    }

    // Dispatch to command
    match cli.command {
        Commands::Install(args) => {
            ConfigManager::ensure_state_dirs().await?;
            leo_setup::cli::commands::install(args, &config).await
        }
        Commands::Verify(args) => {
            ConfigManager::ensure_state_dirs().await?;
            leo_setup::cli::commands::verify(args, &config).await
        }
        Commands::Keys(args) => leo_setup::cli::commands::keys(args, &config).await,
        Commands::Cache(args) => leo_setup::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            leo_setup::cli::commands::config(args, &config, cli.config).await
        }
    }
}

/// 0 = warn (UI only), 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("leo_setup=warn"),
        1 => EnvFilter::new("leo_setup=info"),
        _ => EnvFilter::new("leo_setup=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.with_target(false).without_time().init();
    }
}
