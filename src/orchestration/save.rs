//! Save phase
//!
//! Persists the caches restore recorded. Nothing here fails the job: the
//! build already happened, so every problem is logged and reported.

use crate::cache::{invoke, resolve_workspace, toolchain_tag, CacheCli, CacheInvocation};
use crate::config::{JobContext, SaveInputs};
use crate::proxy::ProxyManager;
use crate::runner::JobRunner;
use crate::session::SessionState;
use crate::toolchain::CachePaths;
use std::path::Path;
use tracing::{debug, info, warn};

/// What save did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// No workspace was known, nothing was attempted
    pub skipped: bool,
    /// Tags saved successfully
    pub saved: Vec<String>,
    /// Tags whose save failed
    pub failed: Vec<String>,
    /// Tags that restore had found in the cache
    pub updated: Vec<String>,
    pub proxy_stopped: bool,
}

impl SaveReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// The save phase of one job
pub struct Save<'a> {
    runner: &'a dyn JobRunner,
    cli: &'a dyn CacheCli,
    proxy: &'a dyn ProxyManager,
    paths: CachePaths,
}

impl<'a> Save<'a> {
    pub fn new(
        runner: &'a dyn JobRunner,
        cli: &'a dyn CacheCli,
        proxy: &'a dyn ProxyManager,
        paths: CachePaths,
    ) -> Self {
        Self {
            runner,
            cli,
            proxy,
            paths,
        }
    }

    /// Save every enabled category that restore recorded a tag for
    pub async fn run(&self, inputs: &SaveInputs) -> SaveReport {
        let state = SessionState::from_runner(self.runner);

        let explicit = inputs.workspace.as_deref().or(state.workspace.as_deref());
        let Ok(workspace) = resolve_workspace(explicit, &JobContext::default()) else {
            info!("No workspace recorded or given, nothing to save");
            return SaveReport::skipped();
        };
        if let Some(dir) = &state.working_dir {
            debug!("Project directory: {}", dir.display());
        }

        // Input and state must both allow a category
        let switches = inputs.switches;
        let toolchain_on = switches.toolchain && state.cache_toolchain != Some(false);
        let modules_on = switches.modules && state.cache_modules != Some(false);
        let build_on = switches.build && state.cache_build != Some(false);
        let protocol_mode = switches.protocol_mode || state.protocol_mode == Some(true);

        let saver = EntrySaver {
            cli: self.cli,
            workspace: &workspace,
            verbose: state.verbose,
            exclude: inputs.exclude.as_deref(),
        };
        let mut report = SaveReport::default();

        if toolchain_on {
            let tag = state.toolchain_tag.clone().or_else(|| {
                let version = state.go_version.as_deref()?;
                Some(toolchain_tag(state.tag_prefix.as_deref()?, version))
            });
            if let Some(tag) = tag.filter(|_| state.go_version.is_some()) {
                saver
                    .save(&tag, &self.paths.toolchain, state.toolchain_restored, &mut report)
                    .await;
            } else {
                debug!("No toolchain tag recorded, skipping");
            }
        }

        if modules_on {
            match &state.modules_tag {
                Some(tag) => {
                    saver
                        .save(tag, &self.paths.modules, state.modules_restored, &mut report)
                        .await
                }
                None => debug!("No modules tag recorded, skipping"),
            }
        }

        if protocol_mode {
            match state.proxy_pid {
                Some(pid) => {
                    let port = state.proxy_port.map_or("unknown".to_string(), |p| p.to_string());
                    info!("Stopping cache registry proxy (pid {}, port {})", pid, port);
                    match self.proxy.stop(pid).await {
                        Ok(()) => report.proxy_stopped = true,
                        Err(e) => warn!("Failed to stop cache registry proxy: {}", e),
                    }
                }
                None => debug!("No proxy recorded, nothing to stop"),
            }
        } else if build_on {
            match &state.build_tag {
                Some(tag) => {
                    saver
                        .save(tag, &self.paths.build, state.build_restored, &mut report)
                        .await
                }
                None => debug!("No build tag recorded, skipping"),
            }
        }

        if report.failed.is_empty() {
            info!(
                "Saved {} cache entries ({} previously restored)",
                report.saved.len(),
                report.updated.len()
            );
        } else {
            warn!(
                "Saved {} cache entries, {} failed: {}",
                report.saved.len(),
                report.failed.len(),
                report.failed.join(", ")
            );
        }
        report
    }
}

struct EntrySaver<'a> {
    cli: &'a dyn CacheCli,
    workspace: &'a str,
    verbose: bool,
    exclude: Option<&'a str>,
}

impl EntrySaver<'_> {
    /// Save one tag from `path`. `restored` is what restore saw for it.
    async fn save(&self, tag: &str, path: &Path, restored: Option<bool>, report: &mut SaveReport) {
        match restored {
            Some(true) => {
                info!("Saving {} <- {} (updating restored entry)", tag, path.display());
                report.updated.push(tag.to_string());
            }
            Some(false) => info!("Saving {} <- {} (new entry)", tag, path.display()),
            None => info!("Saving {} <- {}", tag, path.display()),
        }
        let invocation = CacheInvocation::save(self.workspace, tag, path)
            .verbose(self.verbose)
            .exclude(self.exclude);

        match invoke(self.cli, &invocation).await {
            Ok(outcome) if outcome.exit_code == 0 => report.saved.push(tag.to_string()),
            Ok(outcome) => {
                warn!("Saving {} failed with exit code {}", tag, outcome.exit_code);
                report.failed.push(tag.to_string());
            }
            Err(e) => {
                warn!("Saving {} failed: {}", tag, e);
                report.failed.push(tag.to_string());
            }
        }
    }
}
