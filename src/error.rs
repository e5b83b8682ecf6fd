//! Error types for bump_release operations.
//!
//! This module defines all error types with actionable error messages and recovery suggestions.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bump_release operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all bump_release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Version parsing and version file errors
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// Registry gate failures
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Registry transport errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Git operation errors
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// Build and upload errors
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Recipe rewrite errors
    #[error("Recipe error: {0}")]
    Recipe(#[from] RecipeError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Version parsing and version file errors
#[derive(Error, Debug)]
pub enum VersionError {
    /// Version string could not be parsed
    #[error("Failed to parse version '{input}': {reason}")]
    Parse {
        /// Offending input
        input: String,
        /// Reason for the error
        reason: String,
    },

    /// Major field cannot be incremented any further
    #[error("Version {version} has no successor: major field overflows")]
    Overflow {
        /// Version that could not be incremented
        version: String,
    },

    /// No version declaration matched the pattern
    #[error("No version declaration matching '{pattern}' in {path}")]
    PatternNotFound {
        /// File that was searched
        path: PathBuf,
        /// Pattern that was used
        pattern: String,
    },

    /// More than one version declaration matched
    #[error("Found {count} version declarations in {path}, expected exactly one")]
    AmbiguousPattern {
        /// File that was searched
        path: PathBuf,
        /// Number of matches
        count: usize,
    },

    /// Pattern is not a valid regex or lacks the `version` group
    #[error("Invalid version pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Pattern text
        pattern: String,
        /// Reason for the error
        reason: String,
    },

    /// Version file could not be read or written
    #[error("Failed to access version file {path}: {reason}")]
    FileAccess {
        /// Path to the version file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

/// Registry gate failures
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Registry already reports the version we are about to publish
    #[error("Version {version} of '{package}' is already published")]
    AlreadyPublished {
        /// Package name
        package: String,
        /// Version string
        version: String,
    },

    /// Registry reports a different version than the one just published
    #[error("Registry reports version {found} for '{package}', expected {expected}")]
    VersionMismatch {
        /// Package name
        package: String,
        /// Expected version
        expected: String,
        /// Version observed last
        found: String,
    },

    /// Registry reports the version but no sha256 for its artifact
    #[error("Registry has no sha256 digest for '{package}' {version}")]
    MissingDigest {
        /// Package name
        package: String,
        /// Version string
        version: String,
    },

    /// Registry digest differs from the locally built artifact
    #[error("Digest mismatch for {artifact}: registry {registry}, local {local}")]
    DigestMismatch {
        /// Artifact file name
        artifact: String,
        /// Digest reported by the registry
        registry: String,
        /// Digest of the local file
        local: String,
    },
}

/// Registry transport errors
#[derive(Error, Debug)]
pub enum RegistryError {
    /// HTTP request failed
    #[error("Request to {url} failed: {reason}")]
    Http {
        /// Requested URL
        url: String,
        /// Reason for the error
        reason: String,
    },

    /// Unexpected HTTP status
    #[error("Registry returned HTTP {status} for {url}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Response body did not have the expected shape
    #[error("Malformed registry response: {reason}")]
    Malformed {
        /// Reason for the error
        reason: String,
    },

    /// Registry base URL could not be used
    #[error("Invalid registry URL '{url}': {reason}")]
    InvalidUrl {
        /// Configured URL
        url: String,
        /// Reason for the error
        reason: String,
    },
}

/// Git operation errors
#[derive(Error, Debug)]
pub enum GitError {
    /// Not a git repository
    #[error("Not a git repository: {path}")]
    NotRepository {
        /// Path that was opened
        path: PathBuf,
    },

    /// Commit failed
    #[error("Git commit failed: {reason}")]
    CommitFailed {
        /// Reason for the error
        reason: String,
    },

    /// Push failed
    #[error("Git push failed: {reason}")]
    PushFailed {
        /// Reason for the error
        reason: String,
    },

    /// Clone failed
    #[error("Git clone of {url} failed: {reason}")]
    CloneFailed {
        /// Remote URL
        url: String,
        /// Reason for the error
        reason: String,
    },

    /// Reading HEAD failed
    #[error("Failed to read HEAD: {reason}")]
    HeadUnavailable {
        /// Reason for the error
        reason: String,
    },
}

/// Build and upload errors
#[derive(Error, Debug)]
pub enum PublishError {
    /// Required tool is not on PATH
    #[error("Tool '{program}' not found on PATH")]
    ToolNotFound {
        /// Program name
        program: String,
    },

    /// External command exited non-zero
    #[error("Command '{command}' failed with {status}: {stderr}")]
    CommandFailed {
        /// Rendered command line
        command: String,
        /// Exit status description
        status: String,
        /// Tail of captured stderr
        stderr: String,
    },

    /// Configured command has no program
    #[error("Empty command configured for {step}")]
    EmptyCommand {
        /// Pipeline step
        step: String,
    },

    /// Build produced no artifact for this version
    #[error("No source distribution matching '{pattern}'")]
    ArtifactNotFound {
        /// Glob pattern used
        pattern: String,
    },
}

/// Recipe rewrite errors
#[derive(Error, Debug)]
pub enum RecipeError {
    /// Recipe has no version declaration
    #[error("Recipe has no version declaration line")]
    MissingVersionLine,

    /// Recipe has no sha256 line
    #[error("Recipe has no sha256 line")]
    MissingDigestLine,

    /// Digest is not 64 hex characters
    #[error("Invalid sha256 digest '{digest}'")]
    InvalidDigest {
        /// Offending digest
        digest: String,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {reason}")]
    Read {
        /// Config path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        /// Config path
        path: PathBuf,
        /// Parser error
        #[source]
        source: toml::de::Error,
    },

    /// A field has an unusable value
    #[error("Invalid config value for '{field}': {reason}")]
    Invalid {
        /// Field name
        field: String,
        /// Reason for the error
        reason: String,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl ReleaseError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Version(VersionError::PatternNotFound { path, .. }) => vec![
                format!("Check that {} declares __version__ = \"X.Y.Z\"", path.display()),
                "Set version_pattern in release.toml if the declaration differs".to_string(),
            ],
            ReleaseError::Validation(ValidationError::AlreadyPublished { version, .. }) => vec![
                format!("Version {} is live; this run is probably a duplicate trigger", version),
                "Bump the version file manually if the registry is ahead".to_string(),
            ],
            ReleaseError::Validation(ValidationError::VersionMismatch { .. }) => vec![
                "The registry index may still be updating; re-run `bump_release verify --wait`"
                    .to_string(),
                "Raise BUMP_RELEASE_POLL_TIMEOUT_SECS for slow registries".to_string(),
            ],
            ReleaseError::Publish(PublishError::ToolNotFound { program }) => vec![
                format!("Install '{}' (e.g. pip install build twine)", program),
            ],
            ReleaseError::Publish(PublishError::CommandFailed { .. }) => vec![
                "Check TWINE_USERNAME / TWINE_PASSWORD are set".to_string(),
                "Run the build and upload commands by hand to see full output".to_string(),
            ],
            ReleaseError::Git(GitError::PushFailed { .. }) => vec![
                "Verify push credentials for the remote".to_string(),
                "Pull remote changes and retry".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Check if this error is recoverable by retrying the same step
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReleaseError::Registry(RegistryError::Http { .. })
                | ReleaseError::Registry(RegistryError::Status { .. })
                | ReleaseError::Git(GitError::PushFailed { .. })
                | ReleaseError::Git(GitError::CloneFailed { .. })
                | ReleaseError::Io(_)
        )
    }
}
