//! Reading and rewriting the version declaration in a source file.

use super::Version;
use crate::error::VersionError;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Default declaration pattern: `__version__ = "X.Y.Z"` with either quote style.
pub const DEFAULT_VERSION_PATTERN: &str =
    r#"(?m)^__version__\s*=\s*["'](?P<version>[^"']*)["']"#;

/// A file holding exactly one version declaration.
#[derive(Debug, Clone)]
pub struct VersionFile {
    path: PathBuf,
    pattern: Regex,
}

impl VersionFile {
    /// Bind a file to a declaration pattern.
    ///
    /// The pattern must contain a capture group named `version`.
    pub fn new(path: impl Into<PathBuf>, pattern: &str) -> Result<Self, VersionError> {
        let regex = Regex::new(pattern).map_err(|e| VersionError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        if !regex.capture_names().any(|name| name == Some("version")) {
            return Err(VersionError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "missing named capture group 'version'".to_string(),
            });
        }
        Ok(Self {
            path: path.into(),
            pattern: regex,
        })
    }

    /// Bind a file to [`DEFAULT_VERSION_PATTERN`]
    pub fn with_default_pattern(path: impl Into<PathBuf>) -> Result<Self, VersionError> {
        Self::new(path, DEFAULT_VERSION_PATTERN)
    }

    /// Path of the version file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the declared version
    pub fn read(&self) -> Result<Version, VersionError> {
        let content = self.load()?;
        let (start, end) = self.locate(&content)?;
        Version::parse(&content[start..end])
    }

    /// Replace the declared version, leaving every other byte untouched.
    ///
    /// Returns the version that was replaced.
    pub fn write(&self, new_version: &Version) -> Result<Version, VersionError> {
        let content = self.load()?;
        let (start, end) = self.locate(&content)?;
        let previous = Version::parse(&content[start..end])?;

        let mut updated = String::with_capacity(content.len() + 4);
        updated.push_str(&content[..start]);
        updated.push_str(&new_version.to_string());
        updated.push_str(&content[end..]);

        std::fs::write(&self.path, updated).map_err(|e| VersionError::FileAccess {
            path: self.path.clone(),
            reason: format!("Failed to write file: {}", e),
        })?;

        log::info!(
            "{}: {} -> {}",
            self.path.display(),
            previous,
            new_version
        );
        Ok(previous)
    }

    fn load(&self) -> Result<String, VersionError> {
        std::fs::read_to_string(&self.path).map_err(|e| VersionError::FileAccess {
            path: self.path.clone(),
            reason: format!("Failed to read file: {}", e),
        })
    }

    fn locate(&self, content: &str) -> Result<(usize, usize), VersionError> {
        let spans: Vec<_> = self
            .pattern
            .captures_iter(content)
            .filter_map(|caps| caps.name("version"))
            .map(|m| (m.start(), m.end()))
            .collect();

        match spans.as_slice() {
            [] => Err(VersionError::PatternNotFound {
                path: self.path.clone(),
                pattern: self.pattern.as_str().to_string(),
            }),
            [span] => Ok(*span),
            many => Err(VersionError::AmbiguousPattern {
                path: self.path.clone(),
                count: many.len(),
            }),
        }
    }
}
