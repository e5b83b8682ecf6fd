//! PyPI JSON API client.

use super::{Registry, RegistrySnapshot};
use crate::error::{RegistryError, Result};
use crate::version::Version;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Public PyPI
pub const DEFAULT_REGISTRY_URL: &str = "https://pypi.org/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ProjectDocument {
    info: ProjectInfo,
    #[serde(default)]
    releases: HashMap<String, Vec<ReleaseFile>>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    version: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseFile {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    packagetype: Option<String>,
    #[serde(default)]
    digests: Digests,
}

#[derive(Debug, Default, Deserialize)]
struct Digests {
    #[serde(default)]
    sha256: Option<String>,
}

/// Client for `GET {base}/pypi/{package}/json`
#[derive(Debug, Clone)]
pub struct PypiClient {
    http: reqwest::Client,
    endpoint: Url,
    package: String,
}

impl PypiClient {
    /// Create a client for one package on the registry at `base_url`
    pub fn new(base_url: &str, package: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RegistryError::Http {
                url: base_url.to_string(),
                reason: e.to_string(),
            })?;
        Self::with_client(base_url, package, http)
    }

    /// Create a client that sends its requests through `http`
    pub(crate) fn with_client(
        base_url: &str,
        package: &str,
        http: reqwest::Client,
    ) -> Result<Self> {
        let invalid = |reason: String| RegistryError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };

        // Url::join drops the last path segment unless the base ends in '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
        let endpoint = base
            .join(&format!("pypi/{}/json", package))
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            package: package.to_string(),
        })
    }

    /// JSON endpoint this client polls
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Registry for PypiClient {
    fn package(&self) -> &str {
        &self.package
    }

    async fn snapshot(&self, version: Option<&Version>) -> Result<RegistrySnapshot> {
        let url = self.endpoint.to_string();
        log::debug!("GET {}", url);

        let response = self
            .http
            .get(self.endpoint.clone())
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| RegistryError::Http {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            log::info!("'{}' is not on the registry yet", self.package);
            return Ok(RegistrySnapshot::default());
        }
        if !status.is_success() {
            return Err(RegistryError::Status {
                url,
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.text().await.map_err(|e| RegistryError::Http {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        parse_snapshot(&body, version)
    }
}

/// Extract `info.version` and the digest for `version` from a project document.
///
/// The digest comes from the version's sdist entry when one exists, otherwise
/// from its first file (`releases.<version>[0]`).
pub(crate) fn parse_snapshot(body: &str, version: Option<&Version>) -> Result<RegistrySnapshot> {
    let document: ProjectDocument =
        serde_json::from_str(body).map_err(|e| RegistryError::Malformed {
            reason: e.to_string(),
        })?;

    let mut snapshot = RegistrySnapshot {
        latest: Some(document.info.version),
        sha256: None,
        filename: None,
    };

    let Some(version) = version else {
        return Ok(snapshot);
    };

    if let Some(files) = document.releases.get(&version.to_string()) {
        let chosen = files
            .iter()
            .find(|f| f.packagetype.as_deref() == Some("sdist"))
            .or_else(|| files.first());
        if let Some(file) = chosen {
            snapshot.sha256 = file.digests.sha256.clone();
            snapshot.filename = file.filename.clone();
        }
    }

    Ok(snapshot)
}
