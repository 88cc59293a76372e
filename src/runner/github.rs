//! GitHub Actions file commands
//!
//! State, outputs and exported variables are appended to the files named by
//! `GITHUB_STATE`, `GITHUB_OUTPUT` and `GITHUB_ENV` as heredoc entries:
//!
//! ```text
//! name<<ghadelimiter_<uuid>
//! value
//! ghadelimiter_<uuid>
//! ```
//!
//! PATH additions are appended one per line to `GITHUB_PATH`. The runner
//! hands saved state to the post step as `STATE_<name>` variables.

use crate::error::{GocacheError, GocacheResult};
use crate::runner::{prepend_process_path, set_process_var, JobRunner};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

/// Job runner backed by GitHub Actions file commands
#[derive(Debug, Clone, Default)]
pub struct GithubRunner {
    state_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    env_file: Option<PathBuf>,
    path_file: Option<PathBuf>,
}

impl GithubRunner {
    /// Locate the command files from the runner's environment
    pub fn from_env() -> Self {
        let file = |name: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self {
            state_file: file("GITHUB_STATE"),
            output_file: file("GITHUB_OUTPUT"),
            env_file: file("GITHUB_ENV"),
            path_file: file("GITHUB_PATH"),
        }
    }

    /// Use every command file inside `dir` (state, output, env, path)
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            state_file: Some(dir.join("state")),
            output_file: Some(dir.join("output")),
            env_file: Some(dir.join("env")),
            path_file: Some(dir.join("path")),
        }
    }

    async fn append(file: Option<&Path>, kind: &str, content: &str) -> GocacheResult<()> {
        let Some(path) = file else {
            debug!("No {} file command available, dropping entry", kind);
            return Ok(());
        };

        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| GocacheError::io(format!("opening {} file {}", kind, path.display()), e))?;

        handle
            .write_all(content.as_bytes())
            .await
            .map_err(|e| GocacheError::io(format!("writing {} file {}", kind, path.display()), e))?;
        handle
            .flush()
            .await
            .map_err(|e| GocacheError::io(format!("flushing {} file {}", kind, path.display()), e))
    }
}

/// Format one `name<<delimiter` file command entry
fn heredoc(name: &str, value: &str) -> String {
    let delimiter = format!("ghadelimiter_{}", Uuid::new_v4());
    format!("{name}<<{delimiter}\n{value}\n{delimiter}\n")
}

#[async_trait]
impl JobRunner for GithubRunner {
    fn state(&self, key: &str) -> Option<String> {
        std::env::var(format!("STATE_{key}")).ok()
    }

    async fn save_state(&self, key: &str, value: &str) -> GocacheResult<()> {
        Self::append(self.state_file.as_deref(), "state", &heredoc(key, value)).await
    }

    async fn set_output(&self, name: &str, value: &str) -> GocacheResult<()> {
        Self::append(self.output_file.as_deref(), "output", &heredoc(name, value)).await
    }

    async fn export_variable(&self, name: &str, value: &str) -> GocacheResult<()> {
        set_process_var(name, value);
        Self::append(self.env_file.as_deref(), "env", &heredoc(name, value)).await
    }

    async fn add_path(&self, dir: &Path) -> GocacheResult<()> {
        prepend_process_path(dir);
        Self::append(self.path_file.as_deref(), "path", &format!("{}\n", dir.display())).await
    }
}
