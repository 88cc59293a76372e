//! Remote cache CLI execution
//!
//! Runs the cache CLI as a subprocess, echoes its output to our own
//! stdout/stderr as it arrives so CI logs stay readable, and captures the
//! combined text for hit/miss classification.

use crate::cache::classify::classify;
use crate::config::schema::CliConfig;
use crate::error::{GocacheError, GocacheResult};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Cache CLI operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOperation {
    Restore,
    Save,
}

impl fmt::Display for CacheOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restore => write!(f, "restore"),
            Self::Save => write!(f, "save"),
        }
    }
}

/// One cache CLI call: `<op> <workspace> <tag>:<path> [--verbose] [--exclude <glob>]`
#[derive(Debug, Clone)]
pub struct CacheInvocation {
    pub operation: CacheOperation,
    pub workspace: String,
    pub tag: String,
    pub path: PathBuf,
    pub verbose: bool,
    /// Only passed for saves
    pub exclude: Option<String>,
}

impl CacheInvocation {
    pub fn restore(workspace: &str, tag: &str, path: &Path) -> Self {
        Self {
            operation: CacheOperation::Restore,
            workspace: workspace.to_string(),
            tag: tag.to_string(),
            path: path.to_path_buf(),
            verbose: false,
            exclude: None,
        }
    }

    pub fn save(workspace: &str, tag: &str, path: &Path) -> Self {
        Self {
            operation: CacheOperation::Save,
            ..Self::restore(workspace, tag, path)
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn exclude(mut self, exclude: Option<&str>) -> Self {
        self.exclude = exclude.map(ToString::to_string);
        self
    }

    /// Command-line arguments for the cache CLI
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            self.operation.to_string(),
            self.workspace.clone(),
            format!("{}:{}", self.tag, self.path.display()),
        ];

        if self.verbose {
            args.push("--verbose".to_string());
        }

        if self.operation == CacheOperation::Save {
            if let Some(exclude) = &self.exclude {
                args.push("--exclude".to_string());
                args.push(exclude.clone());
            }
        }

        args
    }
}

/// Exit code and combined stdout+stderr of one cache CLI run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOutcome {
    pub exit_code: i32,
    pub output: String,
}

impl CacheOutcome {
    /// Whether the run restored (or found) the cache entry
    pub fn is_hit(&self) -> bool {
        classify(self.exit_code, &self.output)
    }
}

/// Remote cache CLI
#[async_trait]
pub trait CacheCli: Send + Sync {
    /// Make sure the CLI is available, installing `version` if needed
    async fn ensure_installed(&self, version: Option<&str>) -> GocacheResult<()>;

    /// Run the CLI with the given arguments
    async fn execute(&self, args: &[String]) -> GocacheResult<CacheOutcome>;
}

/// Run one invocation through a cache CLI
pub async fn invoke(cli: &dyn CacheCli, invocation: &CacheInvocation) -> GocacheResult<CacheOutcome> {
    let args = invocation.to_args();
    debug!("Executing cache CLI: {:?}", args);
    let outcome = cli.execute(&args).await?;
    debug!(
        "Cache {} [{}] exited with {}",
        invocation.operation, invocation.tag, outcome.exit_code
    );
    Ok(outcome)
}

/// The `boringcache` CLI as a subprocess
pub struct BoringCacheCli {
    binary: String,
    install_command: Option<String>,
}

impl BoringCacheCli {
    /// Create a CLI wrapper from configuration
    pub fn new(config: &CliConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            install_command: config.install_command.clone(),
        }
    }

    /// Version reported by the installed CLI, if it runs at all
    async fn installed_version(&self) -> Option<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run_installer(&self, command: &str, version: Option<&str>) -> GocacheResult<()> {
        info!("Installing {} {}...", self.binary, version.unwrap_or("latest"));

        let status = Command::new("sh")
            .args(["-c", command])
            .env("BORINGCACHE_VERSION", version.unwrap_or("latest"))
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| GocacheError::command_failed(command, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(GocacheError::command_exit(command, status.code().unwrap_or(-1)))
        }
    }
}

#[async_trait]
impl CacheCli for BoringCacheCli {
    async fn ensure_installed(&self, version: Option<&str>) -> GocacheResult<()> {
        let installed = self.installed_version().await;

        if let Some(reported) = &installed {
            let wanted = version.map(|v| v.trim_start_matches('v'));
            if wanted.is_none_or(|v| reported.contains(v)) {
                debug!("Using installed {}: {}", self.binary, reported);
                return Ok(());
            }
        }

        match (&self.install_command, installed) {
            (Some(command), _) => {
                self.run_installer(command, version).await?;
                if self.installed_version().await.is_none() {
                    return Err(GocacheError::CliNotFound {
                        name: self.binary.clone(),
                        hint: "The install command finished but the CLI still does not run".to_string(),
                    });
                }
                Ok(())
            }
            (None, Some(reported)) => {
                warn!(
                    "Requested {} {} but found {}; no install command configured",
                    self.binary,
                    version.unwrap_or("latest"),
                    reported
                );
                Ok(())
            }
            (None, None) => Err(GocacheError::CliNotFound {
                name: self.binary.clone(),
                hint: "Install it before this step or set [cli] install_command".to_string(),
            }),
        }
    }

    async fn execute(&self, args: &[String]) -> GocacheResult<CacheOutcome> {
        let command = format!("{} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GocacheError::command_failed(&command, e))?;

        let output = tee_child_output(&mut child).await;

        let status = child
            .wait()
            .await
            .map_err(|e| GocacheError::command_failed(&command, e))?;

        Ok(CacheOutcome {
            exit_code: status.code().unwrap_or(-1),
            output,
        })
    }
}

/// Echo a child's stdout and stderr line by line to our own streams while
/// collecting both, interleaved in arrival order, into one buffer.
///
/// Lines are read as raw bytes: they are echoed unchanged and captured
/// lossily, so output that is not UTF-8 never stops either pipe from draining.
async fn tee_child_output(child: &mut Child) -> String {
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return String::new();
    };

    let mut stdout_reader = BufReader::new(stdout);
    let mut stderr_reader = BufReader::new(stderr);
    let mut stdout_line = Vec::new();
    let mut stderr_line = Vec::new();
    let mut our_stdout = tokio::io::stdout();
    let mut our_stderr = tokio::io::stderr();

    let mut captured = String::new();
    let mut stdout_done = false;
    let mut stderr_done = false;

    while !stdout_done || !stderr_done {
        tokio::select! {
            read = stdout_reader.read_until(b'\n', &mut stdout_line), if !stdout_done => {
                let open = tee_line(read, &mut stdout_line, &mut our_stdout, &mut captured, "stdout").await;
                stdout_done = !open;
            }
            read = stderr_reader.read_until(b'\n', &mut stderr_line), if !stderr_done => {
                let open = tee_line(read, &mut stderr_line, &mut our_stderr, &mut captured, "stderr").await;
                stderr_done = !open;
            }
        }
    }

    let _ = our_stdout.flush().await;
    let _ = our_stderr.flush().await;
    captured
}

/// Forward one line read into `line`; false once the stream is finished
async fn tee_line<W: AsyncWrite + Unpin>(
    read: std::io::Result<usize>,
    line: &mut Vec<u8>,
    echo: &mut W,
    captured: &mut String,
    stream: &str,
) -> bool {
    match read {
        Ok(0) => false,
        Ok(_) => {
            let _ = echo.write_all(line).await;
            captured.push_str(&String::from_utf8_lossy(line));
            if !line.ends_with(b"\n") {
                let _ = echo.write_all(b"\n").await;
                captured.push('\n');
            }
            line.clear();
            true
        }
        Err(e) => {
            // Dropping the pipe lets the child see EPIPE instead of blocking
            warn!("Stopped reading cache CLI {}: {}", stream, e);
            line.clear();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_args() {
        let args = CacheInvocation::restore("org/proj", "p-go-modules", Path::new("/go/pkg/mod"))
            .verbose(true)
            .exclude(Some("*.zip"))
            .to_args();
        assert_eq!(
            args,
            vec!["restore", "org/proj", "p-go-modules:/go/pkg/mod", "--verbose"]
        );
    }

    #[test]
    fn save_args_with_exclude() {
        let args = CacheInvocation::save("org/proj", "p-go-build-1.23", Path::new("/cache"))
            .exclude(Some("*.a"))
            .to_args();
        assert_eq!(
            args,
            vec!["save", "org/proj", "p-go-build-1.23:/cache", "--exclude", "*.a"]
        );
    }

    #[test]
    fn outcome_classification() {
        let hit = CacheOutcome { exit_code: 0, output: String::new() };
        let miss = CacheOutcome { exit_code: 0, output: "Cache miss\n".to_string() };
        assert!(hit.is_hit());
        assert!(!miss.is_hit());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_both_streams() {
        let cli = BoringCacheCli::new(&CliConfig {
            binary: "sh".to_string(),
            install_command: None,
        });

        let args = vec!["-c".to_string(), "echo restoring; echo 'Cache miss' >&2; exit 0".to_string()];
        let outcome = cli.execute(&args).await.unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.output.contains("restoring"));
        assert!(outcome.output.contains("Cache miss"));
        assert!(!outcome.is_hit());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_exit_code() {
        let cli = BoringCacheCli::new(&CliConfig {
            binary: "sh".to_string(),
            install_command: None,
        });

        let outcome = cli.execute(&["-c".to_string(), "exit 3".to_string()]).await.unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert!(!outcome.is_hit());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_output_keeps_draining() {
        let cli = BoringCacheCli::new(&CliConfig {
            binary: "sh".to_string(),
            install_command: None,
        });

        let script = "printf 'x \\377\\n'; echo 'Cache miss'";
        let outcome = cli.execute(&["-c".to_string(), script.to_string()]).await.unwrap();
        assert!(outcome.output.contains("x \u{FFFD}"));
        assert!(outcome.output.contains("Cache miss"));
        assert!(!outcome.is_hit());

        // More than a pipe buffer after the bad byte must not block the child
        let script = "printf 'Restoring \\377 file\\n'; head -c 300000 /dev/zero | tr '\\0' 'a'; echo; echo 'Cache miss' >&2";
        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(20),
            cli.execute(&["-c".to_string(), script.to_string()]),
        )
        .await
        .expect("cache CLI output drained")
        .unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.output.len() > 300_000);
        assert!(!outcome.is_hit());
    }

    #[tokio::test]
    async fn missing_binary_without_installer() {
        let cli = BoringCacheCli::new(&CliConfig {
            binary: "gocache-test-no-such-binary".to_string(),
            install_command: None,
        });

        let err = cli.ensure_installed(None).await.unwrap_err();
        assert!(matches!(err, GocacheError::CliNotFound { .. }));

        let err = cli.execute(&[]).await.unwrap_err();
        assert!(matches!(err, GocacheError::CommandFailed { .. }));
    }
}
