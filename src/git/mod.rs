//! Git integration for release workflows.
//!
//! The pipeline only sees the [`GitOperations`] trait; [`SystemGit`] backs it
//! with the `git` binary on PATH.

mod operations;
mod system_git;

pub use operations::{CommitInfo, GitOperations, PushInfo};
pub use system_git::SystemGit;
