//! Git reachability checks, used to detect orphaned memories.
//!
//! Shells out to the `git` binary rather than linking a git library,
//! the same `std::process::Command` approach used elsewhere in this
//! crate for talking to `git`.

use std::path::Path;
use std::process::Command;

use tracing::warn;

/// Whether `commit` is an ancestor of (or equal to) `head` in the
/// repository rooted at `repo_root`.
///
/// Returns `Ok(false)` for a clean "not an ancestor" answer from git.
/// Returns `Err` only when git itself could not be run or exited with a
/// status other than 0 or 1 (a genuinely inconclusive check); callers
/// should treat that as "orphan check failed" and include the item
/// rather than penalize it on an error.
pub fn is_commit_reachable(repo_root: &Path, commit: &str, head: &str) -> Result<bool, String> {
    let output = Command::new("git")
        .args(["merge-base", "--is-ancestor", commit, head])
        .current_dir(repo_root)
        .output()
        .map_err(|e| format!("failed to run git: {e}"))?;

    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        other => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(?other, %stderr, commit, "orphan_check_failed");
            Err(format!(
                "git merge-base exited with {other:?}: {stderr}"
            ))
        }
    }
}

/// Resolve the current HEAD commit SHA for `repo_root`.
pub fn head_commit(repo_root: &Path) -> Result<String, String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_root)
        .output()
        .map_err(|e| format!("failed to run git: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("git rev-parse HEAD failed: {stderr}"));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
