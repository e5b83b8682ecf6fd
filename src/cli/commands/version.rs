//! `next` and `bump` commands.

use super::helpers::{load_config, parse_version_arg, version_file};
use crate::cli::{Args, RuntimeConfig};
use crate::error::{CliError, Result};
use crate::version::Version;
use std::io::Write;

/// Print the successor of the current version
pub(super) fn execute_next(
    args: &Args,
    current: Option<&str>,
    github_output: bool,
    config: &RuntimeConfig,
) -> Result<()> {
    let current = match current {
        Some(value) => parse_version_arg("--current", value)?,
        None => {
            let release_config = load_config(args)?;
            version_file(args, &release_config)?.read()?
        }
    };
    let next = current.increment()?;

    let _ = config
        .output()
        .verbose(&format!("{} -> {}", current, next));
    println!("{}", next);

    if github_output {
        write_github_output(&next)?;
    }
    Ok(())
}

/// Write the successor version into the version file
pub(super) fn execute_bump(args: &Args, config: &RuntimeConfig) -> Result<()> {
    let release_config = load_config(args)?;
    let file = version_file(args, &release_config)?;

    let current = file.read()?;
    let next = current.increment()?;
    file.write(&next)?;

    config.success_println(&format!(
        "{}: {} -> {}",
        file.path().display(),
        current,
        next
    ));
    println!("{}", next);
    Ok(())
}

/// Append `new_version=<v>` to the step output file named by `GITHUB_OUTPUT`
fn write_github_output(version: &Version) -> Result<()> {
    let path = std::env::var_os("GITHUB_OUTPUT").ok_or_else(|| CliError::InvalidArguments {
        reason: "--github-output given but GITHUB_OUTPUT is not set".to_string(),
    })?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    writeln!(file, "new_version={}", version)?;
    Ok(())
}
