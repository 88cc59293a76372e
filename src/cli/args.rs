//! CLI argument definitions using clap derive
//!
//! Every input can also be supplied the way a job runner hands action
//! inputs over: as `INPUT_<NAME>` environment variables.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// gocache - Go toolchain and build cache steps for CI jobs
///
/// Restores the Go toolchain, module cache and build cache before a build,
/// and saves them again afterwards.
#[derive(Parser, Debug)]
#[command(name = "gocache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', global = true, action = ArgAction::Count)]
    pub log_verbosity: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "GOCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve the Go version, install it and restore caches (pre-build)
    Restore(RestoreArgs),

    /// Save caches recorded by restore (post-build)
    Save(SaveArgs),
}

/// Cache category switches shared by both phases
#[derive(Args, Debug, Clone, Default)]
pub struct CacheSwitchArgs {
    /// Cache the Go toolchain installation (default: true)
    #[arg(long, value_name = "BOOL", env = "INPUT_CACHE-GO")]
    pub cache_go: Option<String>,

    /// Cache the Go module download cache (default: true)
    #[arg(long, value_name = "BOOL", env = "INPUT_CACHE-MODULES")]
    pub cache_modules: Option<String>,

    /// Cache the Go build cache (default: true)
    #[arg(long, value_name = "BOOL", env = "INPUT_CACHE-BUILD")]
    pub cache_build: Option<String>,

    /// Serve the build cache through a local GOCACHEPROG proxy (default: false)
    #[arg(long, value_name = "BOOL", env = "INPUT_GOCACHEPROG")]
    pub gocacheprog: Option<String>,
}

/// Arguments for the restore command
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Cache workspace (org/project)
    #[arg(long, env = "INPUT_WORKSPACE")]
    pub workspace: Option<String>,

    /// Cache tag prefix (defaults to the repository name)
    #[arg(long, env = "INPUT_CACHE-TAG")]
    pub cache_tag: Option<String>,

    /// Go version (defaults to go.mod, go.work, .go-version, .tool-versions)
    #[arg(long, env = "INPUT_GO-VERSION")]
    pub go_version: Option<String>,

    /// Directory containing the Go project
    #[arg(long, env = "INPUT_WORKING-DIRECTORY")]
    pub working_directory: Option<String>,

    #[command(flatten)]
    pub switches: CacheSwitchArgs,

    /// Pass --verbose to the cache CLI
    #[arg(long, value_name = "BOOL", env = "INPUT_VERBOSE")]
    pub verbose: Option<String>,

    /// Cache CLI version to install ("skip" to use the one on PATH)
    #[arg(long, env = "INPUT_CLI-VERSION")]
    pub cli_version: Option<String>,
}

/// Arguments for the save command
#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Cache workspace (defaults to the one recorded by restore)
    #[arg(long, env = "INPUT_WORKSPACE")]
    pub workspace: Option<String>,

    #[command(flatten)]
    pub switches: CacheSwitchArgs,

    /// Glob of paths to leave out of saved module and build caches
    #[arg(long, env = "INPUT_EXCLUDE")]
    pub exclude: Option<String>,
}
