//! Job runner integration
//!
//! The restore and save phases run as separate processes. Everything they
//! share goes through the job runner: state written by restore is read back
//! by save, outputs feed later steps, and exported variables and PATH
//! entries persist into every later step of the job.
//!
//! - GitHub Actions: file commands (`GITHUB_STATE`, `GITHUB_OUTPUT`, ...)
//! - Anywhere else: a JSON job file

mod github;
mod local;

pub use github::GithubRunner;
pub use local::{LocalJob, LocalRunner};

use crate::error::GocacheResult;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Key/value services of the surrounding CI job
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Read a value saved by an earlier phase of this job
    fn state(&self, key: &str) -> Option<String>;

    /// Save a value for a later phase of this job
    async fn save_state(&self, key: &str, value: &str) -> GocacheResult<()>;

    /// Publish a step output
    async fn set_output(&self, name: &str, value: &str) -> GocacheResult<()>;

    /// Set an environment variable for this process and later steps
    async fn export_variable(&self, name: &str, value: &str) -> GocacheResult<()>;

    /// Prepend a directory to PATH for this process and later steps
    async fn add_path(&self, dir: &Path) -> GocacheResult<()>;
}

/// Which phase is opening the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Restore,
    Save,
}

/// Create the runner for the current environment
pub async fn detect(phase: Phase) -> GocacheResult<Box<dyn JobRunner>> {
    if std::env::var("GITHUB_ACTIONS").as_deref() == Ok("true") {
        debug!("Using GitHub Actions file commands");
        return Ok(Box::new(GithubRunner::from_env()));
    }

    let path = LocalRunner::default_path();
    debug!("Using local job file: {}", path.display());
    let runner = match phase {
        Phase::Restore => LocalRunner::create(path).await?,
        Phase::Save => LocalRunner::open(path).await?,
    };
    Ok(Box::new(runner))
}

/// Set a variable in this process so the next step of the phase sees it
pub(crate) fn set_process_var(name: &str, value: &str) {
    std::env::set_var(name, value);
}

/// Prepend a directory to this process's PATH
pub(crate) fn prepend_process_path(dir: &Path) {
    let current = std::env::var_os("PATH").unwrap_or_default();
    let mut paths = vec![dir.to_path_buf()];
    paths.extend(std::env::split_paths(&current).filter(|p| p != dir));

    match std::env::join_paths(paths) {
        Ok(joined) => std::env::set_var("PATH", joined),
        Err(e) => debug!("Not adding {} to PATH: {}", dir.display(), e),
    }
}
