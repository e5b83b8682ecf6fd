//! Shared helpers for command executors.

use crate::cli::Args;
use crate::config::ReleaseConfig;
use crate::error::{CliError, Result};
use crate::registry::PypiClient;
use crate::version::{Version, VersionFile};

/// Load release.toml (or defaults) and apply environment overrides
pub(super) fn load_config(args: &Args) -> Result<ReleaseConfig> {
    let path = args.config_path();
    let config = match &args.config {
        // An explicitly named config must exist
        Some(_) => ReleaseConfig::load(&path)?,
        None => ReleaseConfig::load_or_default(&path)?,
    };
    let config = config.apply_env();
    config.validate()?;
    Ok(config)
}

/// Registry client for the configured package
pub(super) fn registry_client(config: &ReleaseConfig) -> Result<PypiClient> {
    PypiClient::new(&config.registry_url, &config.package)
}

/// The project's version file
pub(super) fn version_file(args: &Args, config: &ReleaseConfig) -> Result<VersionFile> {
    Ok(VersionFile::new(
        args.project_dir.join(&config.version_file),
        &config.version_pattern,
    )?)
}

/// Parse a version given on the command line
pub(super) fn parse_version_arg(flag: &str, value: &str) -> Result<Version> {
    Version::parse(value).map_err(|e| {
        CliError::InvalidArguments {
            reason: format!("{}: {}", flag, e),
        }
        .into()
    })
}
