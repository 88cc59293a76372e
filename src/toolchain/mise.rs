//! mise-backed Go toolchain

use crate::config::schema::ToolchainConfig;
use crate::error::{GocacheError, GocacheResult};
use crate::runner::JobRunner;
use crate::toolchain::paths::{self, CachePaths};
use crate::toolchain::Toolchain;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

const MISE_INSTALL_SCRIPT: &str = "curl https://mise.run | sh";

/// Installs Go through mise
pub struct MiseToolchain {
    mise_bin: PathBuf,
}

impl MiseToolchain {
    /// Create a toolchain manager from configuration
    pub fn new(config: &ToolchainConfig) -> Self {
        let mise_bin = config
            .mise_bin
            .clone()
            .unwrap_or_else(|| paths::mise_bin(&paths::home_dir(), std::env::consts::OS));
        Self { mise_bin }
    }

    /// Run a command with inherited output, failing on non-zero exit
    async fn run(program: &Path, args: &[&str]) -> GocacheResult<()> {
        let command = format!("{} {}", program.display(), args.join(" "));
        debug!("Executing: {}", command);

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| GocacheError::command_failed(&command, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(GocacheError::command_exit(command, status.code().unwrap_or(-1)))
        }
    }

    async fn mise(&self, args: &[&str]) -> GocacheResult<()> {
        Self::run(&self.mise_bin, args).await
    }
}

#[async_trait]
impl Toolchain for MiseToolchain {
    async fn install_manager(&self, runner: &dyn JobRunner) -> GocacheResult<()> {
        if self.mise_bin.exists() {
            debug!("mise already installed at {}", self.mise_bin.display());
        } else if cfg!(unix) {
            info!("Installing mise...");
            Self::run(Path::new("sh"), &["-c", MISE_INSTALL_SCRIPT]).await?;
        } else {
            return Err(GocacheError::UnsupportedPlatform(format!(
                "{} (install mise to {} before this step)",
                std::env::consts::OS,
                self.mise_bin.display()
            )));
        }

        if let Some(bin_dir) = self.mise_bin.parent() {
            runner.add_path(bin_dir).await?;
        }
        runner.add_path(&self.cache_paths().toolchain.join("shims")).await
    }

    async fn install(&self, version: &str) -> GocacheResult<()> {
        info!("Installing Go {} via mise...", version);
        let tool = format!("go@{version}");
        self.mise(&["install", &tool]).await?;
        self.mise(&["use", "-g", &tool]).await
    }

    async fn activate(&self, version: &str) -> GocacheResult<()> {
        info!("Activating Go {}...", version);
        self.mise(&["use", "-g", &format!("go@{version}")]).await
    }

    async fn installed_version(&self) -> Option<String> {
        let output = Command::new("go")
            .args(["env", "GOVERSION"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }
        let reported = String::from_utf8_lossy(&output.stdout);
        let reported = reported.trim();
        let version = reported.strip_prefix("go").unwrap_or(reported);
        (!version.is_empty()).then(|| version.to_string())
    }

    async fn configure_env(&self, runner: &dyn JobRunner) -> GocacheResult<()> {
        let gopath = match std::env::var("GOPATH").ok().filter(|v| !v.is_empty()) {
            Some(existing) => PathBuf::from(existing),
            None => {
                let gopath = paths::home_dir().join("go");
                runner
                    .export_variable("GOPATH", &gopath.to_string_lossy())
                    .await?;
                gopath
            }
        };

        runner.add_path(&gopath.join("bin")).await
    }

    fn cache_paths(&self) -> CachePaths {
        CachePaths::detect()
    }
}
