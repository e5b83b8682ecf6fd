//! Git operations trait and types used by the release pipeline.
//!
//! The pipeline only needs to commit, push, read HEAD and clone the
//! feedstock. The production implementation is [`super::SystemGit`].

use crate::error::Result;
use std::future::Future;
use std::path::Path;

/// Git operations required by a release
pub trait GitOperations {
    /// Stage every change in the working tree and commit it
    fn commit_all(&self, message: &str) -> impl Future<Output = Result<CommitInfo>>;

    /// Push `branch` to `remote`
    fn push_branch(&self, remote: &str, branch: &str) -> impl Future<Output = Result<PushInfo>>;

    /// Full message of the HEAD commit
    fn head_message(&self) -> impl Future<Output = Result<String>>;

    /// Name of the checked out branch
    fn current_branch(&self) -> impl Future<Output = Result<String>>;

    /// Clone `branch` of `url` into `dest` and open the clone
    fn clone_branch(
        &self,
        url: &str,
        dest: &Path,
        branch: &str,
    ) -> impl Future<Output = Result<Self>>
    where
        Self: Sized;
}

/// Information about a Git commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// Commit hash (full SHA)
    pub hash: String,
    /// Short commit hash
    pub short_hash: String,
    /// Commit message
    pub message: String,
    /// When the commit was created
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Information about a push operation
#[derive(Debug, Clone)]
pub struct PushInfo {
    /// Remote name that was pushed to
    pub remote_name: String,
    /// Number of commits pushed
    pub commits_pushed: usize,
    /// Any warnings or notes from the push
    pub warnings: Vec<String>,
}
