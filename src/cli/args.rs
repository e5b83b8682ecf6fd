//! Command line argument parsing and validation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Release automation for a registry-published package and its feedstock
#[derive(Parser, Debug)]
#[command(
    name = "bump_release",
    version,
    about = "Bump, publish and repackage a Python release",
    long_about = "Compute the next release version, gate it on the package registry,
publish a source distribution and update the downstream feedstock recipe.

Usage:
  bump_release next --current 1.2.9
  bump_release release --dry-run
  bump_release verify --version 1.3.0 --wait
  bump_release recipe --file recipe/meta.yaml --version 1.3.0 --sha256 <hex>"
)]
pub struct Args {
    /// Project root containing the version file and release.toml
    #[arg(
        short = 'C',
        long,
        global = true,
        default_value = ".",
        env = "BUMP_RELEASE_PROJECT_DIR"
    )]
    pub project_dir: PathBuf,

    /// Config file (defaults to <project-dir>/release.toml)
    #[arg(long, global = true, env = "BUMP_RELEASE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Show verbose progress output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the version that follows the current one
    Next {
        /// Current version; read from the version file when omitted
        #[arg(long)]
        current: Option<String>,

        /// Also append `new_version=<v>` to the file named by $GITHUB_OUTPUT
        #[arg(long)]
        github_output: bool,
    },

    /// Write the next version to the version file
    Bump,

    /// Fail if the registry already reports a version
    Check {
        /// Version to check (defaults to the next version)
        #[arg(long)]
        version: Option<String>,
    },

    /// Fail unless the registry reports a version; print its sha256
    Verify {
        /// Expected version
        #[arg(long)]
        version: String,

        /// Poll with backoff instead of checking once
        #[arg(long)]
        wait: bool,

        /// Override the polling budget in seconds
        #[arg(long, requires = "wait")]
        timeout_secs: Option<u64>,
    },

    /// Rewrite the version and sha256 lines of a recipe file
    Recipe {
        /// Recipe file to rewrite in place
        #[arg(long)]
        file: PathBuf,

        /// New version
        #[arg(long)]
        version: String,

        /// New sha256 digest
        #[arg(long)]
        sha256: String,

        /// Also reset the build number to 0
        #[arg(long)]
        reset_build_number: bool,
    },

    /// Run the full release pipeline
    Release {
        /// Validate only; write, push and upload nothing
        #[arg(long)]
        dry_run: bool,

        /// Commit message to evaluate the trigger against (defaults to HEAD's)
        #[arg(long, env = "BUMP_RELEASE_COMMIT_MESSAGE")]
        commit_message: Option<String>,

        /// Branch to evaluate the trigger against (defaults to the current branch)
        #[arg(long, env = "BUMP_RELEASE_BRANCH")]
        branch: Option<String>,

        /// Release regardless of branch and commit message
        #[arg(long)]
        force: bool,

        /// Print the release report as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Command {
    /// Name used in status messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Next { .. } => "next",
            Command::Bump => "bump",
            Command::Check { .. } => "check",
            Command::Verify { .. } => "verify",
            Command::Recipe { .. } => "recipe",
            Command::Release { .. } => "release",
        }
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.quiet && self.verbose {
            return Err("--quiet and --verbose are mutually exclusive".to_string());
        }
        if let Command::Verify {
            timeout_secs: Some(0),
            ..
        } = &self.command
        {
            return Err("--timeout-secs must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Config file path after defaults
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.project_dir.join(crate::config::CONFIG_FILE_NAME))
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Check if verbose output is enabled
    pub fn is_verbose(&self) -> bool {
        self.output.is_verbose()
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.output.is_quiet()
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}
