//! Command line interface for bump_release.
//!
//! Progress and diagnostics go to stderr through [`OutputManager`]; command
//! results (versions, digests, reports) go to stdout so CI steps can capture
//! them.

mod args;
pub mod commands;
mod output;

pub use args::{Args, Command, RuntimeConfig};
pub use commands::execute_command;
pub use output::OutputManager;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute_command(args).await
}
