//! Job inputs and ambient job context
//!
//! The job runner hands inputs over as strings. Category switches are on
//! unless an input is literally `false`; opt-in switches are on only when an
//! input is literally `true`. Empty strings count as absent.

use crate::cli::args::{CacheSwitchArgs, RestoreArgs, SaveArgs};
use crate::error::{GocacheError, GocacheResult};
use std::path::PathBuf;

/// Sentinel cli-version value that skips installing the cache CLI
const SKIP_INSTALL: &str = "skip";

/// Normalize a raw input: trimmed, and `None` when empty
pub fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Default-on switch: anything but `false` enables it
pub fn input_enabled(raw: Option<&str>) -> bool {
    raw.map(str::trim) != Some("false")
}

/// Default-off switch: only `true` enables it
pub fn input_requested(raw: Option<&str>) -> bool {
    raw.map(str::trim) == Some("true")
}

/// Facts about the surrounding job, read once from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobContext {
    /// Workspace used when none is given (`BORINGCACHE_DEFAULT_WORKSPACE`)
    pub default_workspace: Option<String>,
    /// `owner/name` of the repository being built (`GITHUB_REPOSITORY`)
    pub repository: Option<String>,
}

impl JobContext {
    /// Capture the job context from process environment
    pub fn from_env() -> Self {
        Self {
            default_workspace: non_empty(std::env::var("BORINGCACHE_DEFAULT_WORKSPACE").ok().as_deref()),
            repository: non_empty(std::env::var("GITHUB_REPOSITORY").ok().as_deref()),
        }
    }

    /// Repository name without its owner
    pub fn repository_name(&self) -> Option<&str> {
        let repo = self.repository.as_deref()?;
        match repo.split_once('/') {
            Some((_, name)) if !name.is_empty() => Some(name),
            Some(_) => None,
            None => Some(repo),
        }
    }
}

/// Which cache categories the inputs enable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSwitches {
    pub toolchain: bool,
    pub modules: bool,
    pub build: bool,
    pub protocol_mode: bool,
}

impl CacheSwitches {
    fn from_args(args: &CacheSwitchArgs) -> Self {
        Self {
            toolchain: input_enabled(args.cache_go.as_deref()),
            modules: input_enabled(args.cache_modules.as_deref()),
            build: input_enabled(args.cache_build.as_deref()),
            protocol_mode: input_requested(args.gocacheprog.as_deref()),
        }
    }
}

impl Default for CacheSwitches {
    fn default() -> Self {
        Self {
            toolchain: true,
            modules: true,
            build: true,
            protocol_mode: false,
        }
    }
}

/// Inputs of the restore phase
#[derive(Debug, Clone)]
pub struct RestoreInputs {
    pub workspace: Option<String>,
    pub cache_tag: Option<String>,
    pub go_version: Option<String>,
    pub working_dir: PathBuf,
    pub switches: CacheSwitches,
    pub verbose: bool,
    pub cli_version: Option<String>,
}

impl RestoreInputs {
    /// Build restore inputs from parsed arguments
    pub fn from_args(args: &RestoreArgs) -> GocacheResult<Self> {
        let working_dir = match non_empty(args.working_directory.as_deref()) {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()
                .map_err(|e| GocacheError::io("getting current directory", e))?,
        };

        Ok(Self {
            workspace: non_empty(args.workspace.as_deref()),
            cache_tag: non_empty(args.cache_tag.as_deref()),
            go_version: non_empty(args.go_version.as_deref()),
            working_dir,
            switches: CacheSwitches::from_args(&args.switches),
            verbose: input_requested(args.verbose.as_deref()),
            cli_version: non_empty(args.cli_version.as_deref()),
        })
    }

    /// Whether installing the cache CLI was explicitly skipped
    pub fn skip_cli_install(&self) -> bool {
        self.cli_version
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case(SKIP_INSTALL))
    }
}

/// Inputs of the save phase; merged with session state before use
#[derive(Debug, Clone, Default)]
pub struct SaveInputs {
    pub workspace: Option<String>,
    pub switches: CacheSwitches,
    pub exclude: Option<String>,
}

impl SaveInputs {
    /// Build save inputs from parsed arguments
    pub fn from_args(args: &SaveArgs) -> Self {
        Self {
            workspace: non_empty(args.workspace.as_deref()),
            switches: CacheSwitches::from_args(&args.switches),
            exclude: non_empty(args.exclude.as_deref()),
        }
    }
}
