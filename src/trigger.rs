//! Which pushes start a release.

/// A push releases only on the release branch and only when its commit
/// message contains the trigger keyword (case-sensitive).
pub fn should_release(branch: &str, message: &str, release_branch: &str, keyword: &str) -> bool {
    let branch = branch.strip_prefix("refs/heads/").unwrap_or(branch);
    branch == release_branch && !keyword.is_empty() && message.contains(keyword)
}
