//! Release version arithmetic.
//!
//! Versions are `major.minor.patch` triples advanced by a fixed base-10
//! carry rule: patch and minor roll over after 9, major never does.

mod file;

pub use file::{DEFAULT_VERSION_PATTERN, VersionFile};

use crate::error::VersionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest value a minor or patch field holds before carrying.
pub const FIELD_MAX: u64 = 9;

/// A `major.minor.patch` release version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    /// Major field, unbounded
    pub major: u64,
    /// Minor field, carries into major after 9
    pub minor: u64,
    /// Patch field, carries into minor after 9
    pub patch: u64,
}

impl Version {
    /// Create a version from its three fields
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a `major.minor.patch` string.
    ///
    /// Surrounding whitespace is ignored. The core must be a strict semver
    /// triple (no leading zeros, signs or empty fields); pre-release and
    /// build metadata are rejected because the carry rule has no place for
    /// them.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let fail = |reason: String| VersionError::Parse {
            input: input.to_string(),
            reason,
        };

        let parsed = semver::Version::parse(input.trim()).map_err(|e| fail(e.to_string()))?;
        if !parsed.pre.is_empty() {
            return Err(fail(format!("pre-release '{}' is not supported", parsed.pre)));
        }
        if !parsed.build.is_empty() {
            return Err(fail(format!("build metadata '{}' is not supported", parsed.build)));
        }

        let version = Self::new(parsed.major, parsed.minor, parsed.patch);
        if !version.is_single_digit() {
            log::warn!(
                "version {} has a multi-digit minor/patch field; the increment rule carries after {}",
                version,
                FIELD_MAX
            );
        }
        Ok(version)
    }

    /// Whether minor and patch fit the single-digit scheme
    pub fn is_single_digit(&self) -> bool {
        self.minor <= FIELD_MAX && self.patch <= FIELD_MAX
    }

    /// Compute the successor version.
    ///
    /// `x.y.z` becomes `x.y.(z+1)`; a patch of 9 or more resets to 0 and
    /// carries into minor, and a carried minor of 9 or more resets to 0 and
    /// carries into major. The result is always greater than `self`; a major
    /// that cannot grow any further is [`VersionError::Overflow`].
    pub fn increment(&self) -> Result<Self, VersionError> {
        if self.patch < FIELD_MAX {
            return Ok(Self::new(self.major, self.minor, self.patch + 1));
        }
        if self.minor < FIELD_MAX {
            return Ok(Self::new(self.major, self.minor + 1, 0));
        }

        let major = self
            .major
            .checked_add(1)
            .ok_or_else(|| VersionError::Overflow {
                version: self.to_string(),
            })?;
        Ok(Self::new(major, 0, 0))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}
