//! Local job file
//!
//! Outside a hosted runner the job's state, outputs, exported variables and
//! PATH entries are kept in one JSON file. `restore` starts a fresh file and
//! `save` reads it back.

use crate::config::ConfigManager;
use crate::error::{GocacheError, GocacheResult};
use crate::runner::{prepend_process_path, set_process_var, JobRunner};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

/// Everything one job has recorded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalJob {
    pub state: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub path: Vec<PathBuf>,
}

/// Job runner persisting to a JSON file
#[derive(Debug)]
pub struct LocalRunner {
    path: PathBuf,
    job: Mutex<LocalJob>,
}

impl LocalRunner {
    /// Job file location: `GOCACHE_STATE_FILE`, else the state directory
    pub fn default_path() -> PathBuf {
        std::env::var_os("GOCACHE_STATE_FILE")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| ConfigManager::state_dir().join("job.json"))
    }

    /// Start a new job, discarding any previous job file
    pub async fn create(path: PathBuf) -> GocacheResult<Self> {
        let runner = Self {
            path,
            job: Mutex::new(LocalJob::default()),
        };
        runner.persist().await?;
        Ok(runner)
    }

    /// Continue the job recorded at `path` (empty if there is none)
    pub async fn open(path: PathBuf) -> GocacheResult<Self> {
        let job = if path.exists() {
            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| GocacheError::io(format!("reading job file {}", path.display()), e))?;
            serde_json::from_str(&content)?
        } else {
            LocalJob::default()
        };

        Ok(Self {
            path,
            job: Mutex::new(job),
        })
    }

    /// Snapshot of the recorded job
    pub fn job(&self) -> LocalJob {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LocalJob> {
        self.job.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn update(&self, apply: impl FnOnce(&mut LocalJob)) -> GocacheResult<()> {
        apply(&mut self.lock());
        self.persist().await
    }

    async fn persist(&self) -> GocacheResult<()> {
        let content = serde_json::to_string_pretty(&*self.lock())?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| GocacheError::io("creating job file directory", e))?;
        }

        fs::write(&self.path, content)
            .await
            .map_err(|e| GocacheError::io(format!("writing job file {}", self.path.display()), e))
    }
}

#[async_trait]
impl JobRunner for LocalRunner {
    fn state(&self, key: &str) -> Option<String> {
        self.lock().state.get(key).cloned()
    }

    async fn save_state(&self, key: &str, value: &str) -> GocacheResult<()> {
        self.update(|job| {
            job.state.insert(key.to_string(), value.to_string());
        })
        .await
    }

    async fn set_output(&self, name: &str, value: &str) -> GocacheResult<()> {
        self.update(|job| {
            job.outputs.insert(name.to_string(), value.to_string());
        })
        .await
    }

    async fn export_variable(&self, name: &str, value: &str) -> GocacheResult<()> {
        set_process_var(name, value);
        self.update(|job| {
            job.env.insert(name.to_string(), value.to_string());
        })
        .await
    }

    async fn add_path(&self, dir: &Path) -> GocacheResult<()> {
        prepend_process_path(dir);
        self.update(|job| {
            if !job.path.iter().any(|p| p == dir) {
                job.path.push(dir.to_path_buf());
            }
        })
        .await
    }
}
