//! `release` command.

use super::helpers::{load_config, registry_client};
use crate::cli::{Args, RuntimeConfig};
use crate::error::Result;
use crate::git::SystemGit;
use crate::pipeline::{ReleaseOptions, ReleasePipeline};

/// Run the full pipeline and print its report
pub(super) async fn execute_release(
    args: &Args,
    options: ReleaseOptions,
    json: bool,
    config: &RuntimeConfig,
) -> Result<()> {
    let release_config = load_config(args)?;
    let registry = registry_client(&release_config)?;

    let pipeline = ReleasePipeline::new(
        &args.project_dir,
        &release_config,
        &registry,
        config.output(),
    );
    let report = if options.needs_repository() {
        let repo = SystemGit::open(&args.project_dir).await?;
        pipeline.with_repo(&repo).run(&options).await?
    } else {
        pipeline.run(&options).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(plan) = &report.plan {
        println!("{}", plan.next);
    }
    if let Some(published) = &report.published {
        config.success_println(&format!(
            "Released {} {} (sha256 {})",
            release_config.package, published.version, published.sha256
        ));
    }
    Ok(())
}
