//! Sequential release pipeline.
//!
//! Each step receives the values computed by the previous ones; nothing is
//! passed through the environment or re-read from disk. Steps run strictly in
//! order and the first error aborts the run. There is no rollback: a failure
//! after the version commit is pushed leaves that commit in place.

use crate::cli::OutputManager;
use crate::config::{FeedstockSettings, ReleaseConfig, RetryConfig};
use crate::error::{GitError, Result, ValidationError};
use crate::gate::{self, PublishedRelease};
use crate::git::{CommitInfo, GitOperations, SystemGit};
use crate::publish::{self, Publisher};
use crate::recipe;
use crate::registry::Registry;
use crate::trigger;
use crate::version::{Version, VersionFile};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest wait between git retries
const MAX_GIT_BACKOFF: Duration = Duration::from_secs(30);

/// Caller-supplied switches for one run
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    /// Stop after validation without writing anything
    pub dry_run: bool,
    /// Message to evaluate the trigger rule against; HEAD's when `None`
    pub commit_message: Option<String>,
    /// Branch to evaluate the trigger rule against; current branch when `None`
    pub branch: Option<String>,
    /// Skip the trigger rule entirely
    pub force: bool,
}

impl ReleaseOptions {
    /// Whether a run with these options has to open the project repository
    pub fn needs_repository(&self) -> bool {
        !self.dry_run || (!self.force && (self.commit_message.is_none() || self.branch.is_none()))
    }
}

/// Version transition validated against the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleasePlan {
    /// Version currently declared in the project
    pub current: Version,
    /// Version this release publishes
    pub next: Version,
    /// What the registry reported before publishing
    pub registry_latest: Option<String>,
}

/// Outcome of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseReport {
    /// Validated plan, absent when the trigger rule skipped the run
    pub plan: Option<ReleasePlan>,
    /// Registry confirmation, absent for dry and skipped runs
    pub published: Option<PublishedRelease>,
    /// Hash of the pushed version commit
    pub version_commit: Option<String>,
    /// Hash of the pushed recipe commit
    pub recipe_commit: Option<String>,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Whether the trigger rule skipped the run
    pub skipped: bool,
    /// When the run finished
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl ReleaseReport {
    fn new(dry_run: bool) -> Self {
        Self {
            plan: None,
            published: None,
            version_commit: None,
            recipe_commit: None,
            dry_run,
            skipped: false,
            finished_at: chrono::Utc::now(),
        }
    }
}

/// Runs a release for the project at `project_dir`.
///
/// The project repository is supplied with [`ReleasePipeline::with_repo`];
/// runs that only validate can go without one.
pub struct ReleasePipeline<'a, R: Registry, G: GitOperations = SystemGit> {
    project_dir: PathBuf,
    config: &'a ReleaseConfig,
    retry: RetryConfig,
    registry: &'a R,
    repo: Option<&'a G>,
    output: &'a OutputManager,
}

impl<'a, R: Registry> ReleasePipeline<'a, R> {
    /// Create a pipeline without a repository
    pub fn new(
        project_dir: impl Into<PathBuf>,
        config: &'a ReleaseConfig,
        registry: &'a R,
        output: &'a OutputManager,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            config,
            retry: RetryConfig::from_env(),
            registry,
            repo: None,
            output,
        }
    }
}

impl<'a, R: Registry, G: GitOperations> ReleasePipeline<'a, R, G> {
    /// Commit, push and clone through `repo`
    pub fn with_repo<H: GitOperations>(self, repo: &'a H) -> ReleasePipeline<'a, R, H> {
        ReleasePipeline {
            project_dir: self.project_dir,
            config: self.config,
            retry: self.retry,
            registry: self.registry,
            repo: Some(repo),
            output: self.output,
        }
    }

    /// Override retry limits
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The project's version file
    pub fn version_file(&self) -> Result<VersionFile> {
        Ok(VersionFile::new(
            self.project_dir.join(&self.config.version_file),
            &self.config.version_pattern,
        )?)
    }

    /// Read the current version, compute the next one and gate it on the registry
    pub async fn plan(&self) -> Result<ReleasePlan> {
        let current = self.version_file()?.read()?;
        let next = current.increment()?;
        let snapshot =
            gate::ensure_unpublished_with_retry(self.registry, &next, self.retry.registry_requests)
                .await?;

        Ok(ReleasePlan {
            current,
            next,
            registry_latest: snapshot.latest,
        })
    }

    /// Run every step
    pub async fn run(&self, options: &ReleaseOptions) -> Result<ReleaseReport> {
        let mut report = ReleaseReport::new(options.dry_run);

        if !options.force && !self.triggered(options).await? {
            let _ = self.output.info("Commit does not request a release, nothing to do");
            report.skipped = true;
            return Ok(report);
        }

        let _ = self.output.section("Plan");
        let plan = self.plan().await?;
        let _ = self.output.success(&format!(
            "{} {} -> {} (registry: {})",
            self.config.package,
            plan.current,
            plan.next,
            plan.registry_latest.as_deref().unwrap_or("unpublished")
        ));
        report.plan = Some(plan.clone());

        if options.dry_run {
            let _ = self.output.warn("Dry run: no files written, nothing pushed or uploaded");
            report.finished_at = chrono::Utc::now();
            return Ok(report);
        }
        let repo = self.repository()?;

        let _ = self.output.section("Version commit");
        let commit = self.commit_version(repo, &plan.next).await?;
        report.version_commit = Some(commit.hash.clone());

        let _ = self.output.section("Publish");
        let local_sha256 = self.build_and_upload(&plan.next).await?;

        let _ = self.output.section("Registry");
        let _ = self
            .output
            .progress(&format!("Waiting for the registry to report {}", plan.next));
        let published =
            gate::await_published(self.registry, &plan.next, self.config.poll.to_policy()).await?;
        check_digest(&published, &local_sha256)?;
        let _ = self.output.success(&format!("sha256 {}", published.sha256));

        if let Some(feedstock) = &self.config.feedstock {
            let _ = self.output.section("Feedstock");
            report.recipe_commit = self
                .update_feedstock(feedstock, &plan.next, &published.sha256)
                .await?;
        }

        report.published = Some(published);
        report.finished_at = chrono::Utc::now();
        Ok(report)
    }

    fn repository(&self) -> Result<&'a G> {
        self.repo.ok_or_else(|| {
            GitError::NotRepository {
                path: self.project_dir.clone(),
            }
            .into()
        })
    }

    async fn triggered(&self, options: &ReleaseOptions) -> Result<bool> {
        let message = match &options.commit_message {
            Some(message) => message.clone(),
            None => self.repository()?.head_message().await?,
        };
        let branch = match &options.branch {
            Some(branch) => branch.clone(),
            None => self.repository()?.current_branch().await?,
        };

        let fire = trigger::should_release(
            &branch,
            &message,
            &self.config.release_branch,
            &self.config.trigger_keyword,
        );
        log::info!(
            "trigger on '{}' with keyword '{}': {}",
            branch,
            self.config.trigger_keyword,
            if fire { "release" } else { "skip" }
        );
        Ok(fire)
    }

    async fn commit_version(&self, repo: &G, next: &Version) -> Result<CommitInfo> {
        let file = self.version_file()?;
        let previous = file.write(next)?;
        let _ = self.output.indent(&format!(
            "{}: {} -> {}",
            self.config.version_file.display(),
            previous,
            next
        ));

        let commit = repo
            .commit_all(&self.config.render_commit_message(next))
            .await?;
        let _ = self.output.success(&format!("Committed {}", commit.short_hash));

        let branch = repo.current_branch().await?;
        push_with_retry(repo, &self.config.remote, &branch, self.retry.git_operations).await?;
        let _ = self
            .output
            .success(&format!("Pushed {} to {}", branch, self.config.remote));
        Ok(commit)
    }

    async fn build_and_upload(&self, next: &Version) -> Result<String> {
        let publisher = Publisher::new(
            &self.project_dir,
            &self.config.package,
            self.config.publish.clone(),
        );

        let _ = self.output.progress("Building source distribution");
        let sdist = publisher.build(next).await?;
        let sha256 = publish::sha256_file(&sdist).await?;
        let _ = self
            .output
            .indent(&format!("{} ({})", sdist.display(), sha256));

        let _ = self.output.progress("Uploading");
        publisher.upload(next).await?;
        let _ = self.output.success("Upload finished");
        Ok(sha256)
    }

    async fn update_feedstock(
        &self,
        feedstock: &FeedstockSettings,
        next: &Version,
        sha256: &str,
    ) -> Result<Option<String>> {
        let clone_dir = feedstock_clone_dir(&self.config.package)?;
        let result = self
            .update_feedstock_in(&clone_dir, feedstock, next, sha256)
            .await;

        if clone_dir.exists()
            && let Err(e) = std::fs::remove_dir_all(&clone_dir)
        {
            log::warn!("failed to remove {}: {}", clone_dir.display(), e);
        }
        result
    }

    async fn update_feedstock_in(
        &self,
        clone_dir: &Path,
        feedstock: &FeedstockSettings,
        next: &Version,
        sha256: &str,
    ) -> Result<Option<String>> {
        let project_repo = self.repository()?;
        let (url, branch) = (feedstock.url.as_str(), feedstock.branch.as_str());
        let _ = self.output.progress(&format!("Cloning {}", url));
        let repo = gate::retry_with_backoff(
            move || project_repo.clone_branch(url, clone_dir, branch),
            self.retry.git_operations,
            "feedstock clone",
            MAX_GIT_BACKOFF,
        )
        .await?;

        let recipe_path = clone_dir.join(&feedstock.recipe_path);
        let changed =
            recipe::update_recipe_file(&recipe_path, next, sha256, feedstock.reset_build_number)?;
        if !changed {
            let _ = self.output.info("Recipe already up to date");
            return Ok(None);
        }

        let message = feedstock.commit_message.replace("{version}", &next.to_string());
        let commit = repo.commit_all(&message).await?;
        push_with_retry(&repo, "origin", &feedstock.branch, self.retry.git_operations).await?;
        let _ = self.output.success(&format!(
            "Pushed recipe update {} to {}",
            commit.short_hash, feedstock.branch
        ));
        Ok(Some(commit.hash))
    }
}

async fn push_with_retry<G: GitOperations>(
    repo: &G,
    remote: &str,
    branch: &str,
    max_retries: u32,
) -> Result<()> {
    let info = gate::retry_with_backoff(
        move || repo.push_branch(remote, branch),
        max_retries,
        "git push",
        MAX_GIT_BACKOFF,
    )
    .await?;
    log::info!(
        "pushed {} commit(s) of {} to {}",
        info.commits_pushed,
        branch,
        info.remote_name
    );
    for warning in &info.warnings {
        log::warn!("push to {}: {}", info.remote_name, warning);
    }
    Ok(())
}

/// The registry must advertise the artifact that was built here
fn check_digest(published: &PublishedRelease, local_sha256: &str) -> Result<()> {
    if published.sha256.eq_ignore_ascii_case(local_sha256) {
        return Ok(());
    }
    Err(ValidationError::DigestMismatch {
        artifact: published
            .filename
            .clone()
            .unwrap_or_else(|| published.version.to_string()),
        registry: published.sha256.clone(),
        local: local_sha256.to_string(),
    }
    .into())
}

fn feedstock_clone_dir(package: &str) -> Result<PathBuf> {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| anyhow::anyhow!("system clock before UNIX epoch: {e}"))?
        .as_millis();
    Ok(std::env::temp_dir().join(format!("{}-feedstock-{}", package, timestamp)))
}
