//! gocache - Go toolchain and cache steps for CI jobs
//!
//! CLI entry point that dispatches to the restore and save phases.

use clap::Parser;
use console::style;
use gocache::cli::{Cli, Commands};
use gocache::config::inputs::input_requested;
use gocache::config::{Config, ConfigManager};
use gocache::error::GocacheResult;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> GocacheResult<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise 0 = info, 1 = debug, 2+ = trace
    let runner_debug = std::env::var("RUNNER_DEBUG").as_deref() == Ok("1")
        || input_requested(std::env::var("INPUT_VERBOSE").ok().as_deref());
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match cli.log_verbosity {
            0 if runner_debug => EnvFilter::new("gocache=debug"),
            0 => EnvFilter::new("gocache=info"),
            1 => EnvFilter::new("gocache=debug"),
            _ => EnvFilter::new("gocache=trace"),
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    debug!("Config file: {}", config_manager.path().display());
    let config = match (config_manager.load().await, &cli.command) {
        (Ok(config), _) => config,
        // Save must not fail the job
        (Err(e), Commands::Save(_)) => {
            warn!("Ignoring configuration: {}", e);
            Config::default()
        }
        (Err(e), _) => return Err(e),
    };

    match cli.command {
        Commands::Restore(args) => gocache::cli::commands::restore(args, &config).await,
        Commands::Save(args) => gocache::cli::commands::save(args, &config).await,
    }
}
