//! Command execution.
//!
//! Every command returns `Result<()>`; this module turns the outcome into an
//! exit code and prints recovery suggestions for failures.

mod helpers;
mod recipe;
mod registry;
mod release;
mod version;

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;

use recipe::execute_recipe;
use registry::{execute_check, execute_verify};
use release::execute_release;
use version::{execute_bump, execute_next};

/// Execute the command selected by `args`, returning the process exit code
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        let output = super::OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let config = RuntimeConfig::from(&args);

    let result = match &args.command {
        Command::Next {
            current,
            github_output,
        } => execute_next(&args, current.as_deref(), *github_output, &config),
        Command::Bump => execute_bump(&args, &config),
        Command::Check { version } => execute_check(&args, version.as_deref(), &config).await,
        Command::Verify {
            version,
            wait,
            timeout_secs,
        } => execute_verify(&args, version, *wait, *timeout_secs, &config).await,
        Command::Recipe {
            file,
            version,
            sha256,
            reset_build_number,
        } => execute_recipe(file, version, sha256, *reset_build_number, &config),
        Command::Release {
            dry_run,
            commit_message,
            branch,
            force,
            json,
        } => {
            let options = crate::pipeline::ReleaseOptions {
                dry_run: *dry_run,
                commit_message: commit_message.clone(),
                branch: branch.clone(),
                force: *force,
            };
            execute_release(&args, options, *json, &config).await
        }
    };

    match result {
        Ok(()) => {
            if config.is_verbose() {
                config.success_println(&format!(
                    "Command '{}' completed successfully",
                    args.command.name()
                ));
            }
            Ok(0)
        }
        Err(e) => {
            config.error_println(&format!("Command '{}' failed: {}", args.command.name(), e));

            if !config.is_quiet() {
                let suggestions = e.recovery_suggestions();
                if !suggestions.is_empty() {
                    config.println("\n💡 Recovery suggestions:");
                    for suggestion in suggestions {
                        config.println(&format!("  • {}", suggestion));
                    }
                }
            }

            Ok(1)
        }
    }
}
