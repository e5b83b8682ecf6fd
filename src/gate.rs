//! Registry gates around the publish step.
//!
//! [`ensure_unpublished`] runs before anything is written and stops a
//! duplicate run from re-releasing a live version. [`await_published`] runs
//! after upload and polls with exponential backoff until the registry reports
//! the new version, returning the artifact digest it advertises.

use crate::config::PollPolicy;
use crate::error::{ReleaseError, Result, ValidationError};
use crate::registry::{Registry, RegistrySnapshot};
use crate::version::Version;
use serde::Serialize;
use tokio::time::{Duration, Instant};

/// A release confirmed on the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedRelease {
    /// Confirmed version
    pub version: Version,
    /// sha256 the registry reports for the artifact, unchanged
    pub sha256: String,
    /// Artifact file name, when reported
    pub filename: Option<String>,
    /// Number of registry fetches it took
    pub attempts: u32,
}

/// Fail if the registry already reports `new_version` as current.
///
/// An unknown package counts as unpublished.
pub async fn ensure_unpublished<R: Registry>(
    registry: &R,
    new_version: &Version,
) -> Result<RegistrySnapshot> {
    let snapshot = registry.snapshot(None).await?;

    if snapshot.reports(new_version) {
        return Err(ValidationError::AlreadyPublished {
            package: registry.package().to_string(),
            version: new_version.to_string(),
        }
        .into());
    }

    log::info!(
        "registry reports {} for '{}', {} is free",
        snapshot.latest.as_deref().unwrap_or("nothing"),
        registry.package(),
        new_version
    );
    Ok(snapshot)
}

/// Longest wait between pre-publish lookup retries
const LOOKUP_MAX_DELAY: Duration = Duration::from_secs(10);

/// [`ensure_unpublished`], retrying transient registry errors up to
/// `max_retries` times. An already published version is never retried.
pub async fn ensure_unpublished_with_retry<R: Registry>(
    registry: &R,
    new_version: &Version,
    max_retries: u32,
) -> Result<RegistrySnapshot> {
    retry_with_backoff(
        move || ensure_unpublished(registry, new_version),
        max_retries,
        "registry lookup",
        LOOKUP_MAX_DELAY,
    )
    .await
}

/// Check once that the registry reports `expected` and has its digest
pub async fn verify_published<R: Registry>(
    registry: &R,
    expected: &Version,
) -> Result<PublishedRelease> {
    await_published(registry, expected, PollPolicy::once()).await
}

/// Why the last poll did not confirm the release
enum Pending {
    Mismatch(Option<String>),
    MissingDigest,
    Transient(ReleaseError),
}

/// Poll until the registry reports `expected` with a digest, or the budget runs out.
///
/// Transient registry errors are retried within the same budget; any other
/// error aborts immediately. On timeout the last observation is reported.
pub async fn await_published<R: Registry>(
    registry: &R,
    expected: &Version,
    policy: PollPolicy,
) -> Result<PublishedRelease> {
    let deadline = Instant::now() + policy.timeout;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        let pending = match registry.snapshot(Some(expected)).await {
            Ok(snapshot) if snapshot.reports(expected) => match snapshot.sha256 {
                Some(sha256) => {
                    log::info!(
                        "registry confirmed {} {} after {} attempt(s)",
                        registry.package(),
                        expected,
                        attempts
                    );
                    return Ok(PublishedRelease {
                        version: *expected,
                        sha256,
                        filename: snapshot.filename,
                        attempts,
                    });
                }
                None => Pending::MissingDigest,
            },
            Ok(snapshot) => Pending::Mismatch(snapshot.latest),
            Err(e) if e.is_recoverable() => Pending::Transient(e),
            Err(e) => return Err(e),
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let delay = policy.delay_for(attempts).min(remaining);
        if delay.is_zero() {
            return Err(into_failure(pending, registry.package(), expected));
        }

        match &pending {
            Pending::Mismatch(found) => log::info!(
                "registry still reports {} (attempt {}), retrying in {:.1}s",
                found.as_deref().unwrap_or("nothing"),
                attempts,
                delay.as_secs_f64()
            ),
            Pending::MissingDigest => log::info!(
                "{} is live without a digest yet (attempt {}), retrying in {:.1}s",
                expected,
                attempts,
                delay.as_secs_f64()
            ),
            Pending::Transient(e) => log::warn!(
                "registry request failed (attempt {}): {}, retrying in {:.1}s",
                attempts,
                e,
                delay.as_secs_f64()
            ),
        }

        tokio::time::sleep(delay).await;
    }
}

fn into_failure(pending: Pending, package: &str, expected: &Version) -> ReleaseError {
    match pending {
        Pending::Mismatch(found) => ValidationError::VersionMismatch {
            package: package.to_string(),
            expected: expected.to_string(),
            found: found.unwrap_or_else(|| "<unpublished>".to_string()),
        }
        .into(),
        Pending::MissingDigest => ValidationError::MissingDigest {
            package: package.to_string(),
            version: expected.to_string(),
        }
        .into(),
        Pending::Transient(e) => e,
    }
}

/// Budget-free backoff helper for a single fallible async step.
///
/// Recoverable errors are retried up to `max_retries` times with delays of
/// 1s, 2s, 4s, ... capped at `max_delay`.
pub async fn retry_with_backoff<F, T, Fut>(
    mut operation: F,
    max_retries: u32,
    operation_name: &str,
    max_delay: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempts > 0 {
                    log::info!("{} succeeded after {} retry(ies)", operation_name, attempts);
                }
                return Ok(result);
            }
            Err(e) if !e.is_recoverable() || attempts >= max_retries => return Err(e),
            Err(e) => {
                attempts += 1;
                let wait = Duration::from_secs(2u64.saturating_pow(attempts - 1)).min(max_delay);
                log::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:.1}s",
                    operation_name,
                    attempts,
                    max_retries + 1,
                    e,
                    wait.as_secs_f64()
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Replays scripted responses; the last one repeats forever
    struct ScriptedRegistry {
        responses: RefCell<VecDeque<Result<RegistrySnapshot>>>,
        last: RefCell<Option<RegistrySnapshot>>,
        calls: Cell<u32>,
    }

    impl ScriptedRegistry {
        fn new(responses: Vec<Result<RegistrySnapshot>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                last: RefCell::new(None),
                calls: Cell::new(0),
            }
        }
    }

    impl Registry for ScriptedRegistry {
        fn package(&self) -> &str {
            "pythresh"
        }

        async fn snapshot(&self, _version: Option<&Version>) -> Result<RegistrySnapshot> {
            self.calls.set(self.calls.get() + 1);
            match self.responses.borrow_mut().pop_front() {
                Some(Ok(snap)) => {
                    *self.last.borrow_mut() = Some(snap.clone());
                    Ok(snap)
                }
                Some(Err(e)) => Err(e),
                None => Ok(self.last.borrow().clone().unwrap_or_default()),
            }
        }
    }

    fn snap(latest: &str, sha256: Option<&str>) -> RegistrySnapshot {
        RegistrySnapshot {
            latest: Some(latest.to_string()),
            sha256: sha256.map(str::to_string),
            filename: None,
        }
    }

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            timeout: Duration::from_millis(100),
        }
    }

    fn transient() -> ReleaseError {
        RegistryError::Http {
            url: "https://pypi.org/pypi/pythresh/json".to_string(),
            reason: "connection reset".to_string(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_pre_publish_rejects_existing_version() {
        let registry = ScriptedRegistry::new(vec![Ok(snap("1.2.4", None))]);
        let err = ensure_unpublished(&registry, &Version::new(1, 2, 4))
            .await
            .expect_err("duplicate");
        assert!(matches!(
            err,
            ReleaseError::Validation(ValidationError::AlreadyPublished { .. })
        ));
    }

    #[tokio::test]
    async fn test_pre_publish_accepts_new_version() {
        let registry = ScriptedRegistry::new(vec![Ok(snap("1.2.3", None))]);
        let seen = ensure_unpublished(&registry, &Version::new(1, 2, 4))
            .await
            .expect("free");
        assert_eq!(seen.latest.as_deref(), Some("1.2.3"));
    }

    #[tokio::test]
    async fn test_pre_publish_accepts_unknown_package() {
        let registry = ScriptedRegistry::new(vec![Ok(RegistrySnapshot::default())]);
        ensure_unpublished(&registry, &Version::new(0, 0, 1))
            .await
            .expect("free");
    }

    #[tokio::test]
    async fn test_pre_publish_retries_transient_lookup() {
        let registry = ScriptedRegistry::new(vec![Err(transient()), Ok(snap("1.2.3", None))]);
        let seen = ensure_unpublished_with_retry(&registry, &Version::new(1, 2, 4), 2)
            .await
            .expect("free after retry");
        assert_eq!(seen.latest.as_deref(), Some("1.2.3"));
        assert_eq!(registry.calls.get(), 2);
    }

    #[tokio::test]
    async fn test_pre_publish_retry_stops_at_duplicate() {
        let registry = ScriptedRegistry::new(vec![Ok(snap("1.2.4", None))]);
        let err = ensure_unpublished_with_retry(&registry, &Version::new(1, 2, 4), 5)
            .await
            .expect_err("duplicate");
        assert!(matches!(
            err,
            ReleaseError::Validation(ValidationError::AlreadyPublished { .. })
        ));
        assert_eq!(registry.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_pre_publish_without_retries_surfaces_transient_error() {
        let registry = ScriptedRegistry::new(vec![Err(transient()), Ok(snap("1.2.3", None))]);
        let err = ensure_unpublished_with_retry(&registry, &Version::new(1, 2, 4), 0)
            .await
            .expect_err("no retries left");
        assert!(err.is_recoverable());
        assert_eq!(registry.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_post_publish_captures_digest_unchanged() {
        let registry = ScriptedRegistry::new(vec![Ok(snap("1.2.4", Some("AbC123")))]);
        let published = verify_published(&registry, &Version::new(1, 2, 4))
            .await
            .expect("published");
        assert_eq!(published.sha256, "AbC123");
        assert_eq!(published.attempts, 1);
    }

    #[tokio::test]
    async fn test_post_publish_single_check_mismatch() {
        let registry = ScriptedRegistry::new(vec![Ok(snap("1.2.3", Some("old")))]);
        let err = verify_published(&registry, &Version::new(1, 2, 4))
            .await
            .expect_err("mismatch");
        match err {
            ReleaseError::Validation(ValidationError::VersionMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, "1.2.4");
                assert_eq!(found, "1.2.3");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_polls_until_registry_catches_up() {
        let registry = ScriptedRegistry::new(vec![
            Ok(snap("1.2.3", None)),
            Err(transient()),
            Ok(snap("1.2.4", None)),
            Ok(snap("1.2.4", Some("deadbeef"))),
        ]);
        let published = await_published(&registry, &Version::new(1, 2, 4), fast_policy())
            .await
            .expect("eventually published");
        assert_eq!(published.sha256, "deadbeef");
        assert_eq!(published.attempts, 4);
    }

    #[tokio::test]
    async fn test_poll_times_out_with_last_observation() {
        let registry = ScriptedRegistry::new(vec![Ok(snap("1.2.2", None)), Ok(snap("1.2.3", None))]);
        let err = await_published(&registry, &Version::new(1, 2, 4), fast_policy())
            .await
            .expect_err("timeout");
        assert!(matches!(
            err,
            ReleaseError::Validation(ValidationError::VersionMismatch { ref found, .. }) if found == "1.2.3"
        ));
        assert!(registry.calls.get() > 2);
    }

    #[tokio::test]
    async fn test_poll_reports_missing_digest() {
        let registry = ScriptedRegistry::new(vec![Ok(snap("1.2.4", None))]);
        let err = await_published(&registry, &Version::new(1, 2, 4), fast_policy())
            .await
            .expect_err("no digest");
        assert!(matches!(
            err,
            ReleaseError::Validation(ValidationError::MissingDigest { .. })
        ));
    }

    #[tokio::test]
    async fn test_poll_aborts_on_fatal_error() {
        let registry = ScriptedRegistry::new(vec![Err(RegistryError::Malformed {
            reason: "not json".to_string(),
        }
        .into())]);
        let err = await_published(&registry, &Version::new(1, 2, 4), fast_policy())
            .await
            .expect_err("fatal");
        assert!(matches!(
            err,
            ReleaseError::Registry(RegistryError::Malformed { .. })
        ));
        assert_eq!(registry.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_retry_with_backoff_stops_on_fatal() {
        let calls = Cell::new(0);
        let result: Result<()> = retry_with_backoff(
            || {
                calls.set(calls.get() + 1);
                async {
                    Err(ReleaseError::from(ValidationError::MissingDigest {
                        package: "p".to_string(),
                        version: "1.0.0".to_string(),
                    }))
                }
            },
            3,
            "fatal step",
            Duration::from_millis(1),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_retry_with_backoff_recovers() {
        let calls = Cell::new(0);
        let result = retry_with_backoff(
            || {
                calls.set(calls.get() + 1);
                let attempt = calls.get();
                async move {
                    if attempt < 2 {
                        Err(transient())
                    } else {
                        Ok(attempt)
                    }
                }
            },
            3,
            "flaky step",
            Duration::from_millis(1),
        )
        .await
        .expect("recovers");
        assert_eq!(result, 2);
    }
}
