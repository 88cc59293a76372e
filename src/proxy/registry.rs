//! `cache-registry` proxy process

use crate::config::schema::{CliConfig, ProxyConfig};
use crate::error::{GocacheError, GocacheResult};
use crate::proxy::{ProxyHandle, ProxyManager, PROXY_HOST};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};

const LOG_FILE: &str = "cache-registry.log";

/// Proxy served by the cache CLI's `cache-registry` command
pub struct RegistryProxy {
    binary: String,
    poll_interval: Duration,
    log_dir: Option<PathBuf>,
    /// Children started by this process, so early exits can be detected
    children: Mutex<HashMap<u32, Child>>,
}

impl RegistryProxy {
    /// Create a proxy manager from configuration
    pub fn new(cli: &CliConfig, proxy: &ProxyConfig) -> Self {
        Self {
            binary: cli.binary.clone(),
            poll_interval: Duration::from_millis(proxy.poll_interval_ms.max(10)),
            log_dir: proxy.log_dir.clone(),
            children: Mutex::new(HashMap::new()),
        }
    }

    fn output_target(&self) -> GocacheResult<(Stdio, Stdio)> {
        let Some(dir) = &self.log_dir else {
            return Ok((Stdio::null(), Stdio::null()));
        };

        std::fs::create_dir_all(dir)
            .map_err(|e| GocacheError::io(format!("creating proxy log dir {}", dir.display()), e))?;
        let path = dir.join(LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| GocacheError::io(format!("opening proxy log {}", path.display()), e))?;
        let err_file = file
            .try_clone()
            .map_err(|e| GocacheError::io("duplicating proxy log handle", e))?;

        debug!("Proxy log: {}", path.display());
        Ok((Stdio::from(file), Stdio::from(err_file)))
    }

    /// Whether the process is still running
    fn is_alive(&self, pid: u32) -> bool {
        let mut children = self.children.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(child) = children.get_mut(&pid) {
            return matches!(child.try_wait(), Ok(None));
        }
        drop(children);
        process_exists(pid)
    }
}

#[async_trait]
impl ProxyManager for RegistryProxy {
    async fn allocate_port(&self) -> GocacheResult<u16> {
        let listener = TcpListener::bind((PROXY_HOST, 0))
            .await
            .map_err(|e| GocacheError::io("probing for a free port", e))?;
        let port = listener
            .local_addr()
            .map_err(|e| GocacheError::io("reading probed port", e))?
            .port();
        debug!("Allocated proxy port {}", port);
        Ok(port)
    }

    async fn start(&self, workspace: &str, tag: &str, port: u16) -> GocacheResult<ProxyHandle> {
        let port_arg = port.to_string();
        let args = [
            "cache-registry",
            workspace,
            tag,
            "--host",
            PROXY_HOST,
            "--port",
            &port_arg,
            "--no-platform",
            "--no-git",
        ];
        info!("Starting cache registry proxy on {}:{}...", PROXY_HOST, port);
        debug!("Executing: {} {:?}", self.binary, args);

        let (stdout, stderr) = self.output_target()?;
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);

        // Own process group, so the proxy is not torn down with this step
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command
            .spawn()
            .map_err(|e| GocacheError::ProxyStart(format!("{}: {}", self.binary, e)))?;
        let pid = child.id();
        self.children
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(pid, child);

        debug!("Proxy started with pid {}", pid);
        Ok(ProxyHandle { pid, port })
    }

    async fn await_ready(&self, handle: &ProxyHandle, limit: Duration) -> GocacheResult<()> {
        let deadline = Instant::now() + limit;

        loop {
            let probe = timeout(self.poll_interval, TcpStream::connect((PROXY_HOST, handle.port))).await;
            if matches!(probe, Ok(Ok(_))) {
                info!("Cache registry proxy ready on port {}", handle.port);
                return Ok(());
            }

            if !self.is_alive(handle.pid) {
                return Err(GocacheError::ProxyExited { pid: handle.pid });
            }

            if Instant::now() >= deadline {
                return Err(GocacheError::ProxyTimeout {
                    port: handle.port,
                    timeout_secs: limit.as_secs(),
                });
            }

            sleep(self.poll_interval).await;
        }
    }

    async fn stop(&self, pid: u32) -> GocacheResult<()> {
        terminate(pid)?;

        // Reap it if this process started it
        if let Some(mut child) = self
            .children
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&pid)
        {
            let _ = child.try_wait();
        }
        Ok(())
    }
}

#[cfg(unix)]
fn to_pid(pid: u32) -> Option<nix::unistd::Pid> {
    i32::try_from(pid)
        .ok()
        .filter(|p| *p > 0)
        .map(nix::unistd::Pid::from_raw)
}

/// Whether a process with this pid exists
#[cfg(unix)]
fn process_exists(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;

    let Some(pid) = to_pid(pid) else {
        return false;
    };
    // No signal: existence check only
    matches!(kill(pid, None), Ok(()) | Err(Errno::EPERM))
}

#[cfg(not(unix))]
fn process_exists(_pid: u32) -> bool {
    true
}

/// Send SIGTERM; a process that no longer exists counts as stopped
#[cfg(unix)]
fn terminate(pid: u32) -> GocacheResult<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};

    let Some(target) = to_pid(pid) else {
        return Err(GocacheError::ProxyStop {
            pid,
            reason: "not a valid process id".to_string(),
        });
    };

    match kill(target, Signal::SIGTERM) {
        Ok(()) => {
            info!("Sent SIGTERM to cache registry proxy (pid {})", pid);
            Ok(())
        }
        Err(Errno::ESRCH) => {
            debug!("Proxy pid {} already exited", pid);
            Ok(())
        }
        Err(e) => Err(GocacheError::ProxyStop {
            pid,
            reason: e.to_string(),
        }),
    }
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> GocacheResult<()> {
    let output = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .output()
        .map_err(|e| GocacheError::command_failed("taskkill", e))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.status.success() || stderr.contains("not found") {
        Ok(())
    } else {
        Err(GocacheError::ProxyStop {
            pid,
            reason: stderr.trim().to_string(),
        })
    }
}
