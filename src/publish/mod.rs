//! Source distribution build and upload.
//!
//! Both steps shell out to the project's own tooling (by default
//! `python -m build --sdist` and `twine upload`). Upload credentials are read
//! from the inherited environment by the upload tool itself.

mod command;

pub use command::{CommandOutput, ToolCommand};

use crate::config::PublishSettings;
use crate::error::{PublishError, Result};
use crate::version::Version;
use std::path::{Path, PathBuf};

/// Environment variables the default upload tool reads credentials from
pub const CREDENTIAL_VARS: [&str; 2] = ["TWINE_USERNAME", "TWINE_PASSWORD"];

/// Builds and uploads a package's source distribution
#[derive(Debug, Clone)]
pub struct Publisher {
    project_dir: PathBuf,
    package: String,
    settings: PublishSettings,
}

impl Publisher {
    /// Create a publisher rooted at `project_dir`
    pub fn new(project_dir: impl Into<PathBuf>, package: &str, settings: PublishSettings) -> Self {
        Self {
            project_dir: project_dir.into(),
            package: package.to_string(),
            settings,
        }
    }

    /// Run the build command and return the sdist it produced for `version`
    pub async fn build(&self, version: &Version) -> Result<PathBuf> {
        let command = ToolCommand::from_template(
            "build",
            &self.settings.build,
            &self.project_dir,
            &self.package,
            version,
        )?;
        command.run().await?;
        self.find_sdist(version)
    }

    /// Run the upload command
    pub async fn upload(&self, version: &Version) -> Result<()> {
        for var in CREDENTIAL_VARS {
            if std::env::var_os(var).is_none() {
                log::warn!("{} is not set; the upload tool may prompt or fail", var);
            }
        }

        let command = ToolCommand::from_template(
            "upload",
            &self.settings.upload,
            &self.project_dir,
            &self.package,
            version,
        )?;
        command.run().await?;
        log::info!("uploaded {} {}", self.package, version);
        Ok(())
    }

    /// Locate `<dist_dir>/*-<version>.tar.gz`
    pub fn find_sdist(&self, version: &Version) -> Result<PathBuf> {
        let pattern = self
            .project_dir
            .join(&self.settings.dist_dir)
            .join(format!("*-{}.tar.gz", version));
        let pattern = pattern.to_string_lossy().into_owned();

        let mut matches: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|_| PublishError::ArtifactNotFound {
                pattern: pattern.clone(),
            })?
            .filter_map(std::result::Result::ok)
            .collect();
        matches.sort();

        match matches.into_iter().next() {
            Some(path) => Ok(path),
            None => Err(PublishError::ArtifactNotFound { pattern }.into()),
        }
    }
}

/// Hex sha256 of a file, hashed off the async runtime
pub async fn sha256_file(path: &Path) -> Result<String> {
    use sha2::Digest as _;

    let data = tokio::fs::read(path).await?;
    let digest = tokio::task::spawn_blocking(move || {
        let mut hasher = sha2::Sha256::new();
        hasher.update(&data);
        hex::encode(hasher.finalize())
    })
    .await
    .map_err(|e| anyhow::anyhow!("hashing task failed: {e}"))?;
    Ok(digest)
}
