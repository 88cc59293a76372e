//! Session state shared between the restore and save phases
//!
//! Restore writes flat string key/values through the job runner as it goes.
//! Save reads them back into a [`SessionState`]. A missing key means the
//! step never ran, and save treats that category as disabled.

use crate::error::GocacheResult;
use crate::runner::JobRunner;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

/// Layout version of the keys below
pub const STATE_VERSION: &str = "1";

/// Session state keys
pub mod keys {
    pub const STATE_VERSION: &str = "stateVersion";
    pub const WORKSPACE: &str = "workspace";
    pub const TAG_PREFIX: &str = "cacheTagPrefix";
    pub const GO_VERSION: &str = "goVersion";
    pub const WORKING_DIR: &str = "workingDir";
    pub const CACHE_GO: &str = "cacheGo";
    pub const CACHE_MODULES: &str = "cacheModules";
    pub const CACHE_BUILD: &str = "cacheBuild";
    pub const USE_CACHEPROG: &str = "useGoCacheProg";
    pub const VERBOSE: &str = "verbose";
    pub const GO_TAG: &str = "goTag";
    pub const MODULES_TAG: &str = "modulesTag";
    pub const BUILD_TAG: &str = "buildTag";
    pub const GO_RESTORED: &str = "goRestored";
    pub const MODULES_RESTORED: &str = "modulesRestored";
    pub const BUILD_RESTORED: &str = "buildRestored";
    pub const PROXY_PID: &str = "proxyPid";
    pub const PROXY_PORT: &str = "proxyPort";
}

/// Everything restore recorded, as seen by save
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub workspace: Option<String>,
    pub tag_prefix: Option<String>,
    pub go_version: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub cache_toolchain: Option<bool>,
    pub cache_modules: Option<bool>,
    pub cache_build: Option<bool>,
    pub protocol_mode: Option<bool>,
    pub verbose: bool,
    pub toolchain_tag: Option<String>,
    pub modules_tag: Option<String>,
    pub build_tag: Option<String>,
    pub toolchain_restored: Option<bool>,
    pub modules_restored: Option<bool>,
    pub build_restored: Option<bool>,
    pub proxy_pid: Option<u32>,
    pub proxy_port: Option<u16>,
}

impl SessionState {
    /// Read state through a key lookup
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let flag = |key: &str| get(key).and_then(|v| parse_bool(&v));

        if let Some(version) = get(keys::STATE_VERSION) {
            if version != STATE_VERSION {
                warn!(
                    "Session state version {} is not supported (expected {}), ignoring it",
                    version, STATE_VERSION
                );
                return Self::default();
            }
        }

        Self {
            workspace: get(keys::WORKSPACE),
            tag_prefix: get(keys::TAG_PREFIX),
            go_version: get(keys::GO_VERSION),
            working_dir: get(keys::WORKING_DIR).map(PathBuf::from),
            cache_toolchain: flag(keys::CACHE_GO),
            cache_modules: flag(keys::CACHE_MODULES),
            cache_build: flag(keys::CACHE_BUILD),
            protocol_mode: flag(keys::USE_CACHEPROG),
            verbose: flag(keys::VERBOSE).unwrap_or(false),
            toolchain_tag: get(keys::GO_TAG),
            modules_tag: get(keys::MODULES_TAG),
            build_tag: get(keys::BUILD_TAG),
            toolchain_restored: flag(keys::GO_RESTORED),
            modules_restored: flag(keys::MODULES_RESTORED),
            build_restored: flag(keys::BUILD_RESTORED),
            proxy_pid: get(keys::PROXY_PID).and_then(|v| v.trim().parse().ok()),
            proxy_port: get(keys::PROXY_PORT).and_then(|v| v.trim().parse().ok()),
        }
    }

    /// Read state saved in the job runner
    pub fn from_runner(runner: &dyn JobRunner) -> Self {
        Self::load(|key| runner.state(key))
    }

    /// Load state from a flat map
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        Self::load(|key| map.get(key).cloned())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Write side of the session state, used by restore
pub struct SessionRecorder<'a> {
    runner: &'a dyn JobRunner,
}

impl<'a> SessionRecorder<'a> {
    /// Start recording, stamping the state layout version first
    pub async fn begin(runner: &'a dyn JobRunner) -> GocacheResult<Self> {
        runner.save_state(keys::STATE_VERSION, STATE_VERSION).await?;
        Ok(Self { runner })
    }

    pub async fn record(&self, key: &str, value: &str) -> GocacheResult<()> {
        self.runner.save_state(key, value).await
    }

    pub async fn flag(&self, key: &str, value: bool) -> GocacheResult<()> {
        self.record(key, bool_str(value)).await
    }
}

/// Booleans are stored and published as `true` / `false`
pub fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
