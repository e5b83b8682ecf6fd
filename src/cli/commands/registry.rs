//! `check` and `verify` commands.

use super::helpers::{load_config, parse_version_arg, registry_client, version_file};
use crate::cli::{Args, RuntimeConfig};
use crate::config::{PollPolicy, RetryConfig};
use crate::error::Result;
use crate::gate;
use std::time::Duration;

/// Pre-publish gate
pub(super) async fn execute_check(
    args: &Args,
    version: Option<&str>,
    config: &RuntimeConfig,
) -> Result<()> {
    let release_config = load_config(args)?;
    let target = match version {
        Some(value) => parse_version_arg("--version", value)?,
        None => version_file(args, &release_config)?.read()?.increment()?,
    };

    let registry = registry_client(&release_config)?;
    let retry = RetryConfig::from_env();
    let snapshot =
        gate::ensure_unpublished_with_retry(&registry, &target, retry.registry_requests).await?;

    config.success_println(&format!(
        "{} {} is not published (registry reports {})",
        release_config.package,
        target,
        snapshot.latest.as_deref().unwrap_or("nothing")
    ));
    Ok(())
}

/// Post-publish gate; prints the registry sha256 on success
pub(super) async fn execute_verify(
    args: &Args,
    version: &str,
    wait: bool,
    timeout_secs: Option<u64>,
    config: &RuntimeConfig,
) -> Result<()> {
    let release_config = load_config(args)?;
    let expected = parse_version_arg("--version", version)?;
    let registry = registry_client(&release_config)?;

    let policy = if wait {
        let mut policy = release_config.poll.to_policy();
        if let Some(secs) = timeout_secs {
            policy.timeout = Duration::from_secs(secs);
        }
        let _ = config.output().progress(&format!(
            "Polling {} for up to {}s",
            registry.endpoint(),
            policy.timeout.as_secs()
        ));
        policy
    } else {
        PollPolicy::once()
    };

    let published = gate::await_published(&registry, &expected, policy).await?;
    config.success_println(&format!(
        "{} {} is live after {} check(s)",
        release_config.package, published.version, published.attempts
    ));
    println!("{}", published.sha256);
    Ok(())
}
