//! Configuration schema for gocache
//!
//! Configuration is stored at `~/.config/gocache/config.toml`. Every field
//! has a default, so the file is optional.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote cache CLI settings
    pub cli: CliConfig,

    /// Cache registry proxy settings
    pub proxy: ProxyConfig,

    /// Toolchain settings
    pub toolchain: ToolchainConfig,
}

/// Remote cache CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Binary name or path of the cache CLI
    pub binary: String,

    /// Shell command that installs the CLI when it is missing.
    /// Receives the requested version in `BORINGCACHE_VERSION`.
    pub install_command: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            binary: "boringcache".to_string(),
            install_command: None,
        }
    }
}

/// Cache registry proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Seconds to wait for the proxy to accept connections
    pub ready_timeout_secs: u64,

    /// Delay between readiness probes
    pub poll_interval_ms: u64,

    /// Directory for the proxy's log file (discarded when unset)
    pub log_dir: Option<PathBuf>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            ready_timeout_secs: 30,
            poll_interval_ms: 200,
            log_dir: None,
        }
    }
}

/// Toolchain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Version used when no other source names one
    pub fallback_version: String,

    /// Explicit path to the mise binary
    pub mise_bin: Option<PathBuf>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            fallback_version: "1.23".to_string(),
            mise_bin: None,
        }
    }
}
