//! In-memory collaborators for orchestrator tests

use crate::cache::{CacheCli, CacheOperation, CacheOutcome};
use crate::error::{GocacheError, GocacheResult};
use crate::proxy::{ProxyHandle, ProxyManager};
use crate::runner::JobRunner;
use crate::toolchain::{CachePaths, Toolchain};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap()
}

/// Job runner keeping everything in maps
#[derive(Default)]
pub struct MemoryRunner {
    state: Mutex<BTreeMap<String, String>>,
    outputs: Mutex<BTreeMap<String, String>>,
    env: Mutex<BTreeMap<String, String>>,
    paths: Mutex<Vec<PathBuf>>,
}

impl MemoryRunner {
    /// Runner for a save phase, seeded with what restore left behind
    pub fn with_state(state: BTreeMap<String, String>) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    pub fn state_map(&self) -> BTreeMap<String, String> {
        lock(&self.state).clone()
    }

    pub fn output(&self, name: &str) -> Option<String> {
        lock(&self.outputs).get(name).cloned()
    }

    pub fn env(&self, name: &str) -> Option<String> {
        lock(&self.env).get(name).cloned()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        lock(&self.paths).clone()
    }
}

#[async_trait]
impl JobRunner for MemoryRunner {
    fn state(&self, key: &str) -> Option<String> {
        lock(&self.state).get(key).cloned()
    }

    async fn save_state(&self, key: &str, value: &str) -> GocacheResult<()> {
        lock(&self.state).insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_output(&self, name: &str, value: &str) -> GocacheResult<()> {
        lock(&self.outputs).insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn export_variable(&self, name: &str, value: &str) -> GocacheResult<()> {
        lock(&self.env).insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn add_path(&self, dir: &Path) -> GocacheResult<()> {
        lock(&self.paths).push(dir.to_path_buf());
        Ok(())
    }
}

/// One recorded cache CLI call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliCall {
    pub operation: String,
    pub workspace: String,
    pub tag: String,
    pub args: Vec<String>,
}

/// Cache CLI that records calls and answers from a table
pub struct FakeCacheCli {
    calls: Mutex<Vec<CliCall>>,
    installs: Mutex<Vec<Option<String>>>,
    responses: Mutex<HashMap<(String, String), CacheOutcome>>,
    default: CacheOutcome,
}

impl Default for FakeCacheCli {
    fn default() -> Self {
        Self {
            calls: Mutex::default(),
            installs: Mutex::default(),
            responses: Mutex::default(),
            default: CacheOutcome {
                exit_code: 0,
                output: String::new(),
            },
        }
    }
}

impl FakeCacheCli {
    /// Every call misses unless told otherwise
    pub fn missing() -> Self {
        Self {
            default: CacheOutcome {
                exit_code: 0,
                output: "Cache miss".to_string(),
            },
            ..Self::default()
        }
    }

    /// Answer `op` on `tag` with this exit code and output
    pub fn respond(&self, op: CacheOperation, tag: &str, exit_code: i32, output: &str) {
        lock(&self.responses).insert(
            (op.to_string(), tag.to_string()),
            CacheOutcome {
                exit_code,
                output: output.to_string(),
            },
        );
    }

    pub fn calls(&self) -> Vec<CliCall> {
        lock(&self.calls).clone()
    }

    /// Tags touched by one operation, in call order
    pub fn tags(&self, op: CacheOperation) -> Vec<String> {
        let op = op.to_string();
        self.calls()
            .into_iter()
            .filter(|c| c.operation == op)
            .map(|c| c.tag)
            .collect()
    }

    pub fn installs(&self) -> Vec<Option<String>> {
        lock(&self.installs).clone()
    }
}

#[async_trait]
impl CacheCli for FakeCacheCli {
    async fn ensure_installed(&self, version: Option<&str>) -> GocacheResult<()> {
        lock(&self.installs).push(version.map(String::from));
        Ok(())
    }

    async fn execute(&self, args: &[String]) -> GocacheResult<CacheOutcome> {
        let operation = args.first().cloned().unwrap_or_default();
        let workspace = args.get(1).cloned().unwrap_or_default();
        let tag = args
            .get(2)
            .and_then(|entry| entry.split_once(':'))
            .map(|(tag, _)| tag.to_string())
            .unwrap_or_default();

        lock(&self.calls).push(CliCall {
            operation: operation.clone(),
            workspace,
            tag: tag.clone(),
            args: args.to_vec(),
        });

        Ok(lock(&self.responses)
            .get(&(operation, tag))
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}

/// Toolchain that only records what it was asked to do
#[derive(Default)]
pub struct FakeToolchain {
    installed: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeToolchain {
    pub fn with_installed(version: &str) -> Self {
        Self {
            installed: Some(version.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn paths() -> CachePaths {
        CachePaths {
            toolchain: PathBuf::from("/cache/mise"),
            modules: PathBuf::from("/cache/mod"),
            build: PathBuf::from("/cache/go-build"),
        }
    }

    fn record(&self, call: String) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn install_manager(&self, runner: &dyn JobRunner) -> GocacheResult<()> {
        self.record("install_manager".to_string());
        runner.add_path(Path::new("/cache/mise/shims")).await
    }

    async fn install(&self, version: &str) -> GocacheResult<()> {
        self.record(format!("install {version}"));
        Ok(())
    }

    async fn activate(&self, version: &str) -> GocacheResult<()> {
        self.record(format!("activate {version}"));
        Ok(())
    }

    async fn installed_version(&self) -> Option<String> {
        self.installed.clone()
    }

    async fn configure_env(&self, runner: &dyn JobRunner) -> GocacheResult<()> {
        self.record("configure_env".to_string());
        runner.export_variable("GOPATH", "/home/runner/go").await?;
        runner.add_path(Path::new("/home/runner/go/bin")).await
    }

    fn cache_paths(&self) -> CachePaths {
        Self::paths()
    }
}

/// Proxy manager that never spawns anything
pub struct FakeProxy {
    pub pid: u32,
    pub port: u16,
    ready: bool,
    starts: Mutex<Vec<(String, String, u16)>>,
    ready_waits: Mutex<Vec<Duration>>,
    stops: Mutex<Vec<u32>>,
}

impl Default for FakeProxy {
    fn default() -> Self {
        Self {
            pid: 12345,
            port: 9876,
            ready: true,
            starts: Mutex::default(),
            ready_waits: Mutex::default(),
            stops: Mutex::default(),
        }
    }
}

impl FakeProxy {
    /// A proxy that never becomes ready
    pub fn unresponsive() -> Self {
        Self {
            ready: false,
            ..Self::default()
        }
    }

    pub fn starts(&self) -> Vec<(String, String, u16)> {
        lock(&self.starts).clone()
    }

    pub fn ready_waits(&self) -> Vec<Duration> {
        lock(&self.ready_waits).clone()
    }

    pub fn stops(&self) -> Vec<u32> {
        lock(&self.stops).clone()
    }
}

#[async_trait]
impl ProxyManager for FakeProxy {
    async fn allocate_port(&self) -> GocacheResult<u16> {
        Ok(self.port)
    }

    async fn start(&self, workspace: &str, tag: &str, port: u16) -> GocacheResult<ProxyHandle> {
        lock(&self.starts).push((workspace.to_string(), tag.to_string(), port));
        Ok(ProxyHandle {
            pid: self.pid,
            port,
        })
    }

    async fn await_ready(&self, handle: &ProxyHandle, timeout: Duration) -> GocacheResult<()> {
        lock(&self.ready_waits).push(timeout);
        if self.ready {
            Ok(())
        } else {
            Err(GocacheError::ProxyTimeout {
                port: handle.port,
                timeout_secs: timeout.as_secs(),
            })
        }
    }

    async fn stop(&self, pid: u32) -> GocacheResult<()> {
        lock(&self.stops).push(pid);
        Ok(())
    }
}
