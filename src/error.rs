//! Error types for gocache
//!
//! All modules use `GocacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gocache operations
pub type GocacheResult<T> = Result<T, GocacheError>;

/// All errors that can occur while restoring or saving caches
#[derive(Error, Debug)]
pub enum GocacheError {
    // Resolution errors
    #[error("Workspace required. Set the workspace input or BORINGCACHE_DEFAULT_WORKSPACE")]
    WorkspaceRequired,

    #[error("GOCACHEPROG requires Go {minimum}+, detected {detected}")]
    IncompatibleVersion { detected: String, minimum: String },

    // Proxy errors
    #[error("Cache registry proxy did not accept connections on port {port} within {timeout_secs}s")]
    ProxyTimeout { port: u16, timeout_secs: u64 },

    #[error("Cache registry proxy (pid {pid}) exited before becoming ready")]
    ProxyExited { pid: u32 },

    #[error("Failed to start cache registry proxy: {0}")]
    ProxyStart(String),

    #[error("Failed to stop cache registry proxy (pid {pid}): {reason}")]
    ProxyStop { pid: u32, reason: String },

    // Environment errors
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Required CLI not found: {name}. {hint}")]
    CliNotFound { name: String, hint: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command {command} exited with code {code}")]
    CommandExit { command: String, code: i32 },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GocacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error (the process could not be spawned)
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command exit error (the process ran but failed)
    pub fn command_exit(command: impl Into<String>, code: i32) -> Self {
        Self::CommandExit {
            command: command.into(),
            code,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::WorkspaceRequired => Some("Pass --workspace <org/project>"),
            Self::IncompatibleVersion { .. } => {
                Some("Upgrade go-version or disable the gocacheprog input")
            }
            Self::ProxyTimeout { .. } | Self::ProxyExited { .. } => {
                Some("Set [proxy] log_dir in the config file to capture the proxy's output")
            }
            _ => None,
        }
    }
}
