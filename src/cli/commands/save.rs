//! Save command - post-build phase
//!
//! Never fails the job. Setup problems are logged as warnings and the
//! command still exits successfully.

use crate::cache::BoringCacheCli;
use crate::cli::args::SaveArgs;
use crate::config::{Config, SaveInputs};
use crate::error::GocacheResult;
use crate::orchestration::{Save, SaveReport};
use crate::proxy::RegistryProxy;
use crate::runner::{self, Phase};
use crate::toolchain::CachePaths;
use console::style;
use tracing::warn;

/// Execute the save command
pub async fn execute(args: SaveArgs, config: &Config) -> GocacheResult<()> {
    match run(args, config).await {
        Ok(report) => {
            if !report.skipped {
                println!(
                    "{} Saved {} cache entries",
                    style("✓").green(),
                    report.saved.len()
                );
            }
        }
        Err(e) => warn!("Save skipped: {}", e),
    }
    Ok(())
}

async fn run(args: SaveArgs, config: &Config) -> GocacheResult<SaveReport> {
    let inputs = SaveInputs::from_args(&args);
    let runner = runner::detect(Phase::Save).await?;
    let cli = BoringCacheCli::new(&config.cli);
    let proxy = RegistryProxy::new(&config.cli, &config.proxy);

    let save = Save::new(runner.as_ref(), &cli, &proxy, CachePaths::detect());
    Ok(save.run(&inputs).await)
}
