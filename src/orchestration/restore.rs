//! Restore phase
//!
//! Runs once before the build:
//!
//! ```text
//! Init -> VersionResolved -> ToolchainReady -> EnvironmentConfigured
//!      -> VersionValidated -> DependenciesHandled -> BuildCacheHandled
//! ```
//!
//! Any error moves to `Failed` and is returned to the caller. Everything
//! save needs is recorded in session state as soon as it is known, so a
//! failure late in the phase still leaves a usable session behind.

use crate::cache::{invoke, CacheInvocation, CacheTags};
use crate::cache::{resolve_workspace, tag_prefix};
use crate::config::{Config, JobContext, RestoreInputs};
use crate::error::GocacheResult;
use crate::orchestration::Services;
use crate::proxy::{cacheprog_command, ProxyHandle, CACHEPROG_ENV};
use crate::runner::JobRunner;
use crate::session::{bool_str, keys, SessionRecorder};
use crate::toolchain::{resolve_version, validate_cacheprog, ResolvedVersion};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

/// Step outputs published for later steps of the job
pub mod outputs {
    pub const WORKSPACE: &str = "workspace";
    pub const GO_VERSION: &str = "go-version";
    pub const CACHE_TAG: &str = "cache-tag";
    pub const GO_TAG: &str = "go-tag";
    pub const MODULES_TAG: &str = "modules-tag";
    pub const BUILD_TAG: &str = "build-tag";
    pub const GO_CACHE_HIT: &str = "go-cache-hit";
    pub const MODULES_CACHE_HIT: &str = "modules-cache-hit";
    pub const BUILD_CACHE_HIT: &str = "build-cache-hit";
    pub const CACHE_HIT: &str = "cache-hit";
    pub const GOCACHEPROG_ENABLED: &str = "gocacheprog-enabled";
}

/// Restore state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Init,
    VersionResolved,
    ToolchainReady,
    EnvironmentConfigured,
    VersionValidated,
    DependenciesHandled,
    BuildCacheHandled,
    Failed,
}

impl fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::VersionResolved => "version resolved",
            Self::ToolchainReady => "toolchain ready",
            Self::EnvironmentConfigured => "environment configured",
            Self::VersionValidated => "version validated",
            Self::DependenciesHandled => "dependencies handled",
            Self::BuildCacheHandled => "build cache handled",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// What restore did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub workspace: String,
    pub tag_prefix: String,
    pub version: ResolvedVersion,
    pub tags: CacheTags,
    pub toolchain_hit: bool,
    pub modules_hit: bool,
    pub build_hit: bool,
    /// Running GOCACHEPROG proxy, in protocol mode
    pub proxy: Option<ProxyHandle>,
}

impl RestoreReport {
    /// Composite hit: modules or build cache restored. The proxy never counts.
    pub fn cache_hit(&self) -> bool {
        self.modules_hit || self.build_hit
    }
}

/// The restore phase of one job
pub struct Restore<'a> {
    services: Services<'a>,
    config: &'a Config,
    ctx: &'a JobContext,
    phase: RestorePhase,
}

impl<'a> Restore<'a> {
    pub fn new(services: Services<'a>, config: &'a Config, ctx: &'a JobContext) -> Self {
        Self {
            services,
            config,
            ctx,
            phase: RestorePhase::Init,
        }
    }

    /// Current state machine position
    pub fn phase(&self) -> RestorePhase {
        self.phase
    }

    /// Run every step, stopping at the first fatal error
    pub async fn run(&mut self, inputs: &RestoreInputs) -> GocacheResult<RestoreReport> {
        match self.execute(inputs).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Restore failed after '{}': {}", self.phase, e);
                self.phase = RestorePhase::Failed;
                Err(e)
            }
        }
    }

    fn advance(&mut self, next: RestorePhase) {
        debug!("Restore: {} -> {}", self.phase, next);
        self.phase = next;
    }

    async fn execute(&mut self, inputs: &RestoreInputs) -> GocacheResult<RestoreReport> {
        let Services {
            runner,
            cli,
            toolchain,
            proxy,
        } = self.services;
        let switches = inputs.switches;

        let workspace = resolve_workspace(inputs.workspace.as_deref(), self.ctx)?;
        let prefix = tag_prefix(inputs.cache_tag.as_deref(), self.ctx);
        info!("Workspace: {} (tag prefix {})", workspace, prefix);

        let session = SessionRecorder::begin(runner).await?;
        session.record(keys::WORKSPACE, &workspace).await?;
        session.record(keys::TAG_PREFIX, &prefix).await?;
        session
            .record(keys::WORKING_DIR, &inputs.working_dir.to_string_lossy())
            .await?;
        session.flag(keys::CACHE_GO, switches.toolchain).await?;
        session.flag(keys::CACHE_MODULES, switches.modules).await?;
        session.flag(keys::CACHE_BUILD, switches.build).await?;
        session.flag(keys::USE_CACHEPROG, switches.protocol_mode).await?;
        session.flag(keys::VERBOSE, inputs.verbose).await?;

        let resolved = resolve_version(
            inputs.go_version.as_deref(),
            &inputs.working_dir,
            toolchain,
            &self.config.toolchain.fallback_version,
        )
        .await;
        info!("Go version: {} (from {})", resolved.version, resolved.source);
        session.record(keys::GO_VERSION, &resolved.version).await?;

        let tags = CacheTags::derive(&prefix, &resolved.version);
        if switches.toolchain {
            session.record(keys::GO_TAG, &tags.toolchain).await?;
        }
        if switches.modules {
            session.record(keys::MODULES_TAG, &tags.modules).await?;
        }
        if switches.build && !switches.protocol_mode {
            session.record(keys::BUILD_TAG, &tags.build).await?;
        }
        self.advance(RestorePhase::VersionResolved);

        // The cache CLI has to exist before the first cache call
        if inputs.skip_cli_install() {
            info!("Skipping cache CLI installation");
        } else {
            cli.ensure_installed(inputs.cli_version.as_deref()).await?;
        }

        let paths = toolchain.cache_paths();
        let restorer = EntryRestorer {
            services: self.services,
            workspace: &workspace,
            verbose: inputs.verbose,
        };

        let mut toolchain_hit = false;
        if switches.toolchain {
            toolchain_hit = restorer.restore(&tags.toolchain, &paths.toolchain).await?;
            session.flag(keys::GO_RESTORED, toolchain_hit).await?;
        }

        toolchain.install_manager(runner).await?;
        if toolchain_hit {
            toolchain.activate(&resolved.version).await?;
        } else {
            toolchain.install(&resolved.version).await?;
        }
        self.advance(RestorePhase::ToolchainReady);

        toolchain.configure_env(runner).await?;
        self.advance(RestorePhase::EnvironmentConfigured);

        validate_cacheprog(&resolved.version, switches.protocol_mode)?;
        self.advance(RestorePhase::VersionValidated);

        let mut modules_hit = false;
        if switches.modules {
            modules_hit = restorer.restore(&tags.modules, &paths.modules).await?;
            session.flag(keys::MODULES_RESTORED, modules_hit).await?;
        }
        self.advance(RestorePhase::DependenciesHandled);

        let mut build_hit = false;
        let mut proxy_handle = None;
        if switches.protocol_mode {
            let port = proxy.allocate_port().await?;
            let handle = proxy.start(&workspace, &prefix, port).await?;
            session.record(keys::PROXY_PID, &handle.pid.to_string()).await?;
            session.record(keys::PROXY_PORT, &handle.port.to_string()).await?;

            let limit = Duration::from_secs(self.config.proxy.ready_timeout_secs);
            proxy.await_ready(&handle, limit).await?;

            let command = cacheprog_command(&self.config.cli.binary, handle.port);
            runner.export_variable(CACHEPROG_ENV, &command).await?;
            info!("{}={}", CACHEPROG_ENV, command);
            proxy_handle = Some(handle);
        } else if switches.build {
            build_hit = restorer.restore(&tags.build, &paths.build).await?;
            session.flag(keys::BUILD_RESTORED, build_hit).await?;
        }
        self.advance(RestorePhase::BuildCacheHandled);

        let report = RestoreReport {
            workspace,
            tag_prefix: prefix,
            version: resolved,
            tags,
            toolchain_hit,
            modules_hit,
            build_hit,
            proxy: proxy_handle,
        };
        publish_outputs(runner, &report).await?;
        Ok(report)
    }
}

/// Restores single cache entries for one workspace
struct EntryRestorer<'a> {
    services: Services<'a>,
    workspace: &'a str,
    verbose: bool,
}

impl EntryRestorer<'_> {
    /// Restore one tag into `path`; true on a hit
    async fn restore(&self, tag: &str, path: &Path) -> GocacheResult<bool> {
        info!("Restoring {} -> {}", tag, path.display());
        let invocation = CacheInvocation::restore(self.workspace, tag, path).verbose(self.verbose);
        let hit = invoke(self.services.cli, &invocation).await?.is_hit();

        if hit {
            info!("Cache hit: {}", tag);
        } else {
            info!("Cache miss: {}", tag);
        }
        Ok(hit)
    }
}

async fn publish_outputs(runner: &dyn JobRunner, report: &RestoreReport) -> GocacheResult<()> {
    let values = [
        (outputs::WORKSPACE, report.workspace.as_str()),
        (outputs::GO_VERSION, report.version.version.as_str()),
        (outputs::CACHE_TAG, report.tag_prefix.as_str()),
        (outputs::GO_TAG, report.tags.toolchain.as_str()),
        (outputs::MODULES_TAG, report.tags.modules.as_str()),
        (outputs::BUILD_TAG, report.tags.build.as_str()),
        (outputs::GO_CACHE_HIT, bool_str(report.toolchain_hit)),
        (outputs::MODULES_CACHE_HIT, bool_str(report.modules_hit)),
        (outputs::BUILD_CACHE_HIT, bool_str(report.build_hit)),
        (outputs::CACHE_HIT, bool_str(report.cache_hit())),
        (outputs::GOCACHEPROG_ENABLED, bool_str(report.proxy.is_some())),
    ];

    for (name, value) in values {
        runner.set_output(name, value).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOperation;
    use crate::config::inputs::CacheSwitches;
    use crate::error::GocacheError;
    use crate::testing::{FakeCacheCli, FakeProxy, FakeToolchain, MemoryRunner};
    use crate::toolchain::VersionSource;
    use std::path::PathBuf;

    struct Fixture {
        runner: MemoryRunner,
        cli: FakeCacheCli,
        toolchain: FakeToolchain,
        proxy: FakeProxy,
        config: Config,
        ctx: JobContext,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                runner: MemoryRunner::default(),
                cli: FakeCacheCli::default(),
                toolchain: FakeToolchain::default(),
                proxy: FakeProxy::default(),
                config: Config::default(),
                ctx: JobContext::default(),
            }
        }

        fn services(&self) -> Services<'_> {
            Services {
                runner: &self.runner,
                cli: &self.cli,
                toolchain: &self.toolchain,
                proxy: &self.proxy,
            }
        }

        async fn run(&self, inputs: &RestoreInputs) -> (RestorePhase, GocacheResult<RestoreReport>) {
            let mut restore = Restore::new(self.services(), &self.config, &self.ctx);
            let result = restore.run(inputs).await;
            (restore.phase(), result)
        }
    }

    fn inputs(version: &str) -> RestoreInputs {
        RestoreInputs {
            workspace: Some("org/proj".to_string()),
            cache_tag: Some("proj".to_string()),
            go_version: Some(version.to_string()),
            working_dir: PathBuf::from("/nonexistent/project"),
            switches: CacheSwitches::default(),
            verbose: false,
            cli_version: None,
        }
    }

    #[tokio::test]
    async fn toolchain_hit_activates() {
        let fx = Fixture::new();
        let (phase, report) = fx.run(&inputs("1.23.4")).await;
        let report = report.unwrap();

        assert_eq!(phase, RestorePhase::BuildCacheHandled);
        assert!(report.toolchain_hit);
        assert_eq!(
            fx.toolchain.calls(),
            vec!["install_manager", "activate 1.23.4", "configure_env"]
        );
        assert_eq!(
            fx.runner.paths(),
            vec![PathBuf::from("/cache/mise/shims"), PathBuf::from("/home/runner/go/bin")]
        );
    }

    #[tokio::test]
    async fn toolchain_miss_installs() {
        let mut fx = Fixture::new();
        fx.cli = FakeCacheCli::missing();
        let report = fx.run(&inputs("1.23.4")).await.1.unwrap();

        assert!(!report.toolchain_hit);
        assert!(!report.cache_hit());
        assert!(fx.toolchain.calls().contains(&"install 1.23.4".to_string()));
        assert_eq!(fx.runner.output(outputs::CACHE_HIT).as_deref(), Some("false"));
        assert_eq!(fx.runner.state(keys::GO_RESTORED).as_deref(), Some("false"));
    }

    #[tokio::test]
    async fn failed_cli_run_is_a_miss() {
        let fx = Fixture::new();
        fx.cli.respond(CacheOperation::Restore, "proj-go-modules", 1, "");
        let report = fx.run(&inputs("1.23")).await.1.unwrap();

        assert!(!report.modules_hit);
        assert!(report.build_hit);
        assert!(report.cache_hit());
    }

    #[tokio::test]
    async fn cli_installed_before_first_cache_call() {
        let fx = Fixture::new();
        let mut inputs = inputs("1.23");
        inputs.cli_version = Some("v1.2.0".to_string());
        fx.run(&inputs).await.1.unwrap();

        assert_eq!(fx.cli.installs(), vec![Some("v1.2.0".to_string())]);
    }

    #[tokio::test]
    async fn skip_sentinel_skips_cli_install() {
        let fx = Fixture::new();
        let mut inputs = inputs("1.23");
        inputs.cli_version = Some("Skip".to_string());
        fx.run(&inputs).await.1.unwrap();

        assert!(fx.cli.installs().is_empty());
        assert_eq!(fx.cli.calls().len(), 3);
    }

    #[tokio::test]
    async fn workspace_is_required() {
        let fx = Fixture::new();
        let mut inputs = inputs("1.23");
        inputs.workspace = None;
        let (phase, result) = fx.run(&inputs).await;

        assert!(matches!(result, Err(GocacheError::WorkspaceRequired)));
        assert_eq!(phase, RestorePhase::Failed);
        assert!(fx.cli.calls().is_empty());
        assert!(fx.runner.state_map().is_empty());
    }

    #[tokio::test]
    async fn version_recorded_before_later_failure() {
        let mut fx = Fixture::new();
        fx.proxy = FakeProxy::unresponsive();
        let mut inputs = inputs("1.24.2");
        inputs.switches.protocol_mode = true;
        let (phase, result) = fx.run(&inputs).await;

        assert!(matches!(result, Err(GocacheError::ProxyTimeout { .. })));
        assert_eq!(phase, RestorePhase::Failed);
        assert_eq!(fx.runner.state(keys::GO_VERSION).as_deref(), Some("1.24.2"));
        assert_eq!(fx.runner.state(keys::PROXY_PID).as_deref(), Some("12345"));
        assert_eq!(fx.runner.env(CACHEPROG_ENV), None);
    }

    #[tokio::test]
    async fn proxy_waits_for_configured_timeout() {
        let mut fx = Fixture::new();
        fx.config.proxy.ready_timeout_secs = 7;
        let mut inputs = inputs("1.24");
        inputs.switches.protocol_mode = true;
        fx.run(&inputs).await.1.unwrap();

        assert_eq!(fx.proxy.ready_waits(), vec![Duration::from_secs(7)]);
        assert_eq!(fx.proxy.starts(), vec![("org/proj".to_string(), "proj".to_string(), 9876)]);
    }

    #[tokio::test]
    async fn version_falls_back_to_installed_toolchain() {
        let mut fx = Fixture::new();
        fx.toolchain = FakeToolchain::with_installed("1.22.5");
        let mut inputs = inputs("1.23");
        inputs.go_version = None;
        let report = fx.run(&inputs).await.1.unwrap();

        assert_eq!(report.version.version, "1.22.5");
        assert_eq!(report.version.source, VersionSource::Installed);
        assert_eq!(report.tags.build, "proj-go-build-1.22");
    }

    #[tokio::test]
    async fn verbose_is_passed_to_cache_cli() {
        let fx = Fixture::new();
        let mut inputs = inputs("1.23");
        inputs.verbose = true;
        fx.run(&inputs).await.1.unwrap();

        assert!(fx
            .cli
            .calls()
            .iter()
            .all(|c| c.args.last().map(String::as_str) == Some("--verbose")));
    }

    #[tokio::test]
    async fn publishes_outputs() {
        let fx = Fixture::new();
        fx.run(&inputs("1.23.1")).await.1.unwrap();

        let output = |name: &str| fx.runner.output(name);
        assert_eq!(output(outputs::WORKSPACE).as_deref(), Some("org/proj"));
        assert_eq!(output(outputs::GO_VERSION).as_deref(), Some("1.23.1"));
        assert_eq!(output(outputs::CACHE_TAG).as_deref(), Some("proj"));
        assert_eq!(output(outputs::GO_TAG).as_deref(), Some("proj-go-1.23.1"));
        assert_eq!(output(outputs::BUILD_TAG).as_deref(), Some("proj-go-build-1.23"));
        assert_eq!(output(outputs::GO_CACHE_HIT).as_deref(), Some("true"));
        assert_eq!(output(outputs::CACHE_HIT).as_deref(), Some("true"));
        assert_eq!(output(outputs::GOCACHEPROG_ENABLED).as_deref(), Some("false"));
    }

    #[tokio::test]
    async fn state_machine_reaches_terminal_state() {
        let fx = Fixture::new();
        let restore = Restore::new(fx.services(), &fx.config, &fx.ctx);
        assert_eq!(restore.phase(), RestorePhase::Init);

        let (phase, _) = fx.run(&inputs("1.23")).await;
        assert_eq!(phase, RestorePhase::BuildCacheHandled);
    }
}
