//! Restore command - pre-build phase

use crate::cache::BoringCacheCli;
use crate::cli::args::RestoreArgs;
use crate::config::{Config, JobContext, RestoreInputs};
use crate::error::GocacheResult;
use crate::orchestration::{Restore, Services};
use crate::proxy::RegistryProxy;
use crate::runner::{self, Phase};
use crate::toolchain::MiseToolchain;
use console::style;

/// Execute the restore command
pub async fn execute(args: RestoreArgs, config: &Config) -> GocacheResult<()> {
    let inputs = RestoreInputs::from_args(&args)?;
    let ctx = JobContext::from_env();

    let runner = runner::detect(Phase::Restore).await?;
    let cli = BoringCacheCli::new(&config.cli);
    let toolchain = MiseToolchain::new(&config.toolchain);
    let proxy = RegistryProxy::new(&config.cli, &config.proxy);

    let services = Services {
        runner: runner.as_ref(),
        cli: &cli,
        toolchain: &toolchain,
        proxy: &proxy,
    };
    let report = Restore::new(services, config, &ctx).run(&inputs).await?;

    let hit = if report.cache_hit() {
        style("cache hit").green()
    } else {
        style("cache miss").yellow()
    };
    println!(
        "{} Go {} ready ({})",
        style("✓").green(),
        style(&report.version.version).cyan(),
        hit
    );
    if let Some(handle) = report.proxy {
        println!(
            "  GOCACHEPROG proxy listening on port {} (pid {})",
            handle.port, handle.pid
        );
    }

    Ok(())
}
