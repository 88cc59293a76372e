//! Go toolchain management
//!
//! Installing and activating Go is delegated to mise. The version to use is
//! resolved from the project (see [`version`]).

mod mise;
pub mod paths;
pub mod version;

pub use mise::MiseToolchain;
pub use paths::CachePaths;
pub use version::{major_minor, resolve_version, validate_cacheprog, ResolvedVersion, VersionSource};

use crate::error::GocacheResult;
use crate::runner::JobRunner;
use async_trait::async_trait;

/// Toolchain installer and environment
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Install the version manager and put it on PATH
    async fn install_manager(&self, runner: &dyn JobRunner) -> GocacheResult<()>;

    /// Download, install and select a Go version
    async fn install(&self, version: &str) -> GocacheResult<()>;

    /// Select an already installed (restored) Go version
    async fn activate(&self, version: &str) -> GocacheResult<()>;

    /// Version of the Go already on PATH, if any
    async fn installed_version(&self) -> Option<String>;

    /// Export GOPATH and put `$GOPATH/bin` on PATH
    async fn configure_env(&self, runner: &dyn JobRunner) -> GocacheResult<()>;

    /// Local directories of each cache category
    fn cache_paths(&self) -> CachePaths;
}
