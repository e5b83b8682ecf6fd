//! Release configuration.
//!
//! Settings come from `release.toml` (every field optional) and are then
//! overridden by `BUMP_RELEASE_*` environment variables. Retry counts and
//! poll budgets are clamped so a typo cannot stall a CI job for hours.

use crate::error::{ConfigError, Result};
use crate::registry::DEFAULT_REGISTRY_URL;
use crate::version::DEFAULT_VERSION_PATTERN;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the project directory
pub const CONFIG_FILE_NAME: &str = "release.toml";

/// Top-level release configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    /// Registry package name
    pub package: String,
    /// File holding the version declaration, relative to the project root
    pub version_file: PathBuf,
    /// Regex with a `version` capture group locating the declaration
    pub version_pattern: String,
    /// Registry base URL
    pub registry_url: String,
    /// Branch whose pushes may trigger a release
    pub release_branch: String,
    /// Substring a commit message must contain to trigger a release
    pub trigger_keyword: String,
    /// Remote to push the version commit to
    pub remote: String,
    /// Version commit message; `{version}` is substituted
    pub commit_message: String,
    /// Build and upload commands
    pub publish: PublishSettings,
    /// Downstream recipe repository, skipped when absent
    pub feedstock: Option<FeedstockSettings>,
    /// Post-publish polling budget
    pub poll: PollSettings,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            package: "pythresh".to_string(),
            version_file: PathBuf::from("pythresh/version.py"),
            version_pattern: DEFAULT_VERSION_PATTERN.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            release_branch: "main".to_string(),
            trigger_keyword: "bump".to_string(),
            remote: "origin".to_string(),
            commit_message: "Bump version to {version}".to_string(),
            publish: PublishSettings::default(),
            feedstock: None,
            poll: PollSettings::default(),
        }
    }
}

/// External build and upload commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishSettings {
    /// Source distribution build command (program followed by args)
    pub build: Vec<String>,
    /// Upload command; `{package}`/`{version}` are substituted and args
    /// containing glob characters are expanded
    pub upload: Vec<String>,
    /// Directory the build writes artifacts to
    pub dist_dir: PathBuf,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            build: vec![
                "python".to_string(),
                "-m".to_string(),
                "build".to_string(),
                "--sdist".to_string(),
            ],
            upload: vec![
                "twine".to_string(),
                "upload".to_string(),
                "dist/*-{version}.tar.gz".to_string(),
            ],
            dist_dir: PathBuf::from("dist"),
        }
    }
}

/// Recipe repository settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedstockSettings {
    /// Clone URL
    pub url: String,
    /// Branch to update
    #[serde(default = "default_feedstock_branch")]
    pub branch: String,
    /// Recipe path inside the clone
    #[serde(default = "default_recipe_path")]
    pub recipe_path: PathBuf,
    /// Recipe commit message; `{version}` is substituted
    #[serde(default = "default_feedstock_message")]
    pub commit_message: String,
    /// Reset `number:` to 0 alongside the version
    #[serde(default = "default_true")]
    pub reset_build_number: bool,
}

fn default_feedstock_branch() -> String {
    "main".to_string()
}

fn default_recipe_path() -> PathBuf {
    PathBuf::from("recipe/meta.yaml")
}

fn default_feedstock_message() -> String {
    "Update to {version}".to_string()
}

fn default_true() -> bool {
    true
}

/// Post-publish polling budget in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    /// Delay before the first retry
    pub initial_delay_secs: u64,
    /// Cap on a single delay
    pub max_delay_secs: u64,
    /// Overall budget
    pub timeout_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: 5,
            max_delay_secs: 60,
            timeout_secs: 600,
        }
    }
}

const MAX_POLL_TIMEOUT_SECS: u64 = 3600;

impl PollSettings {
    /// Convert to the runtime polling policy
    pub fn to_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_secs(self.initial_delay_secs.max(1)),
            max_delay: Duration::from_secs(self.max_delay_secs.max(1)),
            timeout: Duration::from_secs(self.timeout_secs.min(MAX_POLL_TIMEOUT_SECS)),
        }
    }
}

/// Exponential backoff policy for registry polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before the first retry, doubled after every attempt
    pub initial_delay: Duration,
    /// Cap on a single delay
    pub max_delay: Duration,
    /// Overall budget; zero means a single attempt
    pub timeout: Duration,
}

impl PollPolicy {
    /// Single fetch, no waiting
    pub const fn once() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            timeout: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl ReleaseConfig {
    /// Load `path`, or fall back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BUMP_RELEASE_*` environment overrides
    pub fn apply_env(self) -> Self {
        self.apply_overrides(env_lookup)
    }

    /// Apply overrides resolved through `lookup` (variable name to value)
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("BUMP_RELEASE_REGISTRY_URL")
            && !url.trim().is_empty()
        {
            self.registry_url = url.trim().to_string();
        }
        self.poll.timeout_secs = parse_clamped(
            &lookup,
            "BUMP_RELEASE_POLL_TIMEOUT_SECS",
            self.poll.timeout_secs,
            MAX_POLL_TIMEOUT_SECS,
        );
        self
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, reason: &str| ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if self.package.trim().is_empty() {
            return Err(invalid("package", "must not be empty").into());
        }
        if self.trigger_keyword.is_empty() {
            return Err(invalid("trigger_keyword", "must not be empty").into());
        }
        if self.publish.build.is_empty() {
            return Err(invalid("publish.build", "needs at least a program").into());
        }
        if self.publish.upload.is_empty() {
            return Err(invalid("publish.upload", "needs at least a program").into());
        }
        if self.poll.initial_delay_secs > self.poll.max_delay_secs {
            return Err(invalid("poll.initial_delay_secs", "exceeds poll.max_delay_secs").into());
        }
        if let Some(feedstock) = &self.feedstock
            && feedstock.url.trim().is_empty()
        {
            return Err(invalid("feedstock.url", "must not be empty").into());
        }
        Ok(())
    }

    /// Version commit message for `version`
    pub fn render_commit_message(&self, version: &impl std::fmt::Display) -> String {
        self.commit_message.replace("{version}", &version.to_string())
    }
}

/// Retry limits for network operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Max retries for git push and clone
    pub git_operations: u32,
    /// Max retries for a single registry request outside polling
    pub registry_requests: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            git_operations: 3,
            registry_requests: 5,
        }
    }
}

impl RetryConfig {
    /// Create config from environment variables with fallback to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Create config from variables resolved through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let count = |var_name: &str, default: u32, max: u32| {
            let parsed = parse_clamped(&lookup, var_name, u64::from(default), u64::from(max));
            u32::try_from(parsed).unwrap_or(max)
        };
        Self {
            git_operations: count("BUMP_RELEASE_RETRY_GIT", defaults.git_operations, 10),
            registry_requests: count(
                "BUMP_RELEASE_RETRY_REGISTRY",
                defaults.registry_requests,
                20,
            ),
        }
    }
}

fn env_lookup(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok()
}

/// Parse a count, clamped to `max`; unset or unparsable values give `default`
fn parse_clamped(
    lookup: &impl Fn(&str) -> Option<String>,
    var_name: &str,
    default: u64,
    max: u64,
) -> u64 {
    lookup(var_name)
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|v| v.min(max))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ReleaseConfig::default();
        config.validate().expect("defaults are valid");
        assert_eq!(config.trigger_keyword, "bump");
        assert_eq!(config.release_branch, "main");
        assert!(config.feedstock.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
package = "mypkg"
version_file = "src/mypkg/__init__.py"

[feedstock]
url = "https://github.com/conda-forge/mypkg-feedstock.git"

[poll]
timeout_secs = 120
"#,
        )
        .expect("write");

        let config = ReleaseConfig::load(&path).expect("load");
        assert_eq!(config.package, "mypkg");
        assert_eq!(config.version_file, PathBuf::from("src/mypkg/__init__.py"));
        assert_eq!(config.registry_url, DEFAULT_REGISTRY_URL);
        assert_eq!(config.poll.timeout_secs, 120);
        assert_eq!(config.poll.initial_delay_secs, 5);

        let feedstock = config.feedstock.expect("feedstock");
        assert_eq!(feedstock.branch, "main");
        assert_eq!(feedstock.recipe_path, PathBuf::from("recipe/meta.yaml"));
        assert!(feedstock.reset_build_number);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "pakage = \"typo\"\n").expect("write");
        assert!(ReleaseConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ReleaseConfig::load_or_default(Path::new("/nonexistent/release.toml"))
            .expect("defaults");
        assert_eq!(config.package, "pythresh");
    }

    #[test]
    fn test_invalid_poll_bounds() {
        let mut config = ReleaseConfig::default();
        config.poll.initial_delay_secs = 120;
        config.poll.max_delay_secs = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_policy_backoff() {
        let policy = PollSettings {
            initial_delay_secs: 5,
            max_delay_secs: 30,
            timeout_secs: 600,
        }
        .to_policy();
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(20));
        assert_eq!(policy.delay_for(4), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn test_poll_timeout_clamped() {
        let policy = PollSettings {
            initial_delay_secs: 1,
            max_delay_secs: 1,
            timeout_secs: 999_999,
        }
        .to_policy();
        assert_eq!(policy.timeout, Duration::from_secs(MAX_POLL_TIMEOUT_SECS));
    }

    #[test]
    fn test_commit_message_rendering() {
        let config = ReleaseConfig::default();
        assert_eq!(config.render_commit_message(&"1.2.4"), "Bump version to 1.2.4");
    }

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn test_overrides_replace_registry_and_timeout() {
        let config = ReleaseConfig::default().apply_overrides(vars(&[
            ("BUMP_RELEASE_REGISTRY_URL", " https://test.pypi.org/ "),
            ("BUMP_RELEASE_POLL_TIMEOUT_SECS", "90"),
        ]));
        assert_eq!(config.registry_url, "https://test.pypi.org/");
        assert_eq!(config.poll.timeout_secs, 90);
    }

    #[test]
    fn test_overrides_clamp_and_ignore_garbage() {
        let config = ReleaseConfig::default().apply_overrides(vars(&[
            ("BUMP_RELEASE_REGISTRY_URL", "  "),
            ("BUMP_RELEASE_POLL_TIMEOUT_SECS", "999999"),
        ]));
        assert_eq!(config.registry_url, DEFAULT_REGISTRY_URL);
        assert_eq!(config.poll.timeout_secs, MAX_POLL_TIMEOUT_SECS);

        let config = ReleaseConfig::default()
            .apply_overrides(vars(&[("BUMP_RELEASE_POLL_TIMEOUT_SECS", "soon")]));
        assert_eq!(config.poll.timeout_secs, 600);
    }

    #[test]
    fn test_retry_counts_from_variables() {
        assert_eq!(RetryConfig::from_lookup(vars(&[])), RetryConfig::default());

        let retry = RetryConfig::from_lookup(vars(&[
            ("BUMP_RELEASE_RETRY_GIT", "0"),
            ("BUMP_RELEASE_RETRY_REGISTRY", "7"),
        ]));
        assert_eq!(retry.git_operations, 0);
        assert_eq!(retry.registry_requests, 7);

        let clamped = RetryConfig::from_lookup(vars(&[
            ("BUMP_RELEASE_RETRY_GIT", "500"),
            ("BUMP_RELEASE_RETRY_REGISTRY", "-1"),
        ]));
        assert_eq!(clamped.git_operations, 10);
        assert_eq!(clamped.registry_requests, 5);
    }
}
