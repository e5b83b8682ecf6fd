//! [`GitOperations`] backed by the system `git` binary.

use crate::error::{GitError, Result};
use crate::git::{CommitInfo, GitOperations, PushInfo};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Repository driven through `git -C <work_tree> ...`
#[derive(Debug, Clone)]
pub struct SystemGit {
    work_tree: PathBuf,
}

/// Captured output of a successful git invocation
struct GitOutput {
    stdout: String,
    stderr: String,
}

impl SystemGit {
    /// Open the repository containing `path`
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let output = run_git(path, &["rev-parse", "--show-toplevel"])
            .await
            .map_err(|reason| {
                log::debug!("rev-parse in {} failed: {}", path.display(), reason);
                GitError::NotRepository {
                    path: path.to_path_buf(),
                }
            })?;

        Ok(Self {
            work_tree: PathBuf::from(output.stdout),
        })
    }

    async fn git(&self, args: &[&str]) -> std::result::Result<GitOutput, String> {
        run_git(&self.work_tree, args).await
    }
}

impl GitOperations for SystemGit {
    async fn commit_all(&self, message: &str) -> Result<CommitInfo> {
        let commit_failed = |reason: String| GitError::CommitFailed { reason };

        self.git(&["add", "--all"])
            .await
            .map_err(|e| commit_failed(format!("Failed to stage changes: {}", e)))?;
        self.git(&["commit", "--quiet", "-m", message])
            .await
            .map_err(|e| commit_failed(format!("Failed to create commit: {}", e)))?;
        let hash = self
            .git(&["rev-parse", "HEAD"])
            .await
            .map_err(|e| commit_failed(format!("Failed to resolve new commit: {}", e)))?
            .stdout;

        let short_hash: String = hash.chars().take(7).collect();
        log::info!("committed {} in {}", short_hash, self.work_tree.display());

        Ok(CommitInfo {
            hash,
            short_hash,
            message: message.to_string(),
            timestamp: chrono::Utc::now(),
        })
    }

    async fn push_branch(&self, remote: &str, branch: &str) -> Result<PushInfo> {
        // Unknown until the remote has the branch
        let range = format!("{}/{}..HEAD", remote, branch);
        let commits_pushed = self
            .git(&["rev-list", "--count", range.as_str()])
            .await
            .ok()
            .and_then(|out| out.stdout.parse().ok())
            .unwrap_or(0);

        let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);
        let output = self
            .git(&["push", remote, refspec.as_str()])
            .await
            .map_err(|e| GitError::PushFailed {
                reason: format!("Failed to push '{}' to '{}': {}", branch, remote, e),
            })?;

        let warnings = output
            .stderr
            .lines()
            .filter(|line| line.to_ascii_lowercase().contains("warning"))
            .map(str::to_string)
            .collect();

        Ok(PushInfo {
            remote_name: remote.to_string(),
            commits_pushed,
            warnings,
        })
    }

    async fn head_message(&self) -> Result<String> {
        let output = self
            .git(&["log", "-1", "--format=%B"])
            .await
            .map_err(|reason| GitError::HeadUnavailable { reason })?;
        Ok(output.stdout)
    }

    async fn current_branch(&self) -> Result<String> {
        let branch = self
            .git(&["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .map_err(|reason| GitError::HeadUnavailable { reason })?
            .stdout;

        if branch == "HEAD" {
            return Err(GitError::HeadUnavailable {
                reason: "HEAD is detached; pass --branch".to_string(),
            }
            .into());
        }
        Ok(branch)
    }

    async fn clone_branch(&self, url: &str, dest: &Path, branch: &str) -> Result<Self> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let dest_arg = dest.to_string_lossy();

        run_git(
            parent,
            &[
                "clone",
                "--quiet",
                "--single-branch",
                "--branch",
                branch,
                url,
                dest_arg.as_ref(),
            ],
        )
        .await
        .map_err(|reason| GitError::CloneFailed {
            url: url.to_string(),
            reason,
        })?;

        log::info!("cloned {} ({}) into {}", url, branch, dest.display());
        Self::open(dest).await
    }
}

async fn run_git(dir: &Path, args: &[&str]) -> std::result::Result<GitOutput, String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "core.quotePath=false", "-c", "advice.detachedHead=false"])
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| format!("failed to run git: {}", e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        return Err(format!(
            "git {} exited with {}: {}",
            args.first().copied().unwrap_or_default(),
            output.status,
            stderr
        ));
    }
    Ok(GitOutput { stdout, stderr })
}
