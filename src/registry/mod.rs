//! Package registry lookups.
//!
//! The registry is an external, read-only fact: every check fetches a fresh
//! [`RegistrySnapshot`]. The [`Registry`] trait is the seam the release
//! gates are written against; [`PypiClient`] implements it over the PyPI
//! JSON API.

mod pypi;

pub use pypi::{DEFAULT_REGISTRY_URL, PypiClient};

use crate::error::Result;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// What the registry reports for a package at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Latest published version, `None` if the package is unknown
    pub latest: Option<String>,
    /// Artifact sha256 for the version the snapshot was requested for
    pub sha256: Option<String>,
    /// Artifact file name matching `sha256`
    pub filename: Option<String>,
}

impl RegistrySnapshot {
    /// Whether the registry's latest version is exactly `version`
    pub fn reports(&self, version: &Version) -> bool {
        self.latest.as_deref().map(str::trim) == Some(version.to_string().as_str())
    }
}

/// Read access to a package registry
pub trait Registry {
    /// Name of the package being released
    fn package(&self) -> &str;

    /// Fetch the current state, including the digest for `version` when given
    fn snapshot(&self, version: Option<&Version>) -> impl Future<Output = Result<RegistrySnapshot>>;
}
