//! Temporary clone workspaces for branch activities.
//!
//! A workspace path is derived from a replayable id so that a retried
//! activity lands on the same directory instead of leaking half-built clones
//! under fresh random names.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use crate::types::Sha;

use super::{RepositoryError, git_command};

/// Derives the replayable workspace directory name for one activity.
///
/// Deterministic in (org, repo, branch, commit): a retry of the same logical
/// activity reuses the same path.
pub fn workspace_id(org: &str, repo: &str, branch: &str, sha: &Sha) -> String {
    let mut hasher = DefaultHasher::new();
    (org, repo, branch, sha.as_str()).hash(&mut hasher);
    format!("ws-{:016x}", hasher.finish())
}

/// Clones `url` at `branch` into `dest`, pinned to `sha` via a detached
/// checkout.
///
/// Fails with `AlreadyCloned` if `dest` exists; callers decide whether to
/// reuse or to remove and retry.
pub fn clone_at(url: &str, branch: &str, sha: &Sha, dest: &Path) -> Result<(), RepositoryError> {
    if dest.exists() {
        return Err(RepositoryError::AlreadyCloned {
            path: dest.display().to_string(),
        });
    }
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let dest_str = dest.display().to_string();
    let output = git_command(parent)
        .args(["clone", "--branch", branch, "--", url, &dest_str])
        .output()?;
    if !output.status.success() {
        return Err(RepositoryError::CloneFailed {
            details: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let output = git_command(dest)
        .args(["checkout", "--detach", sha.as_str()])
        .output()?;
    if !output.status.success() {
        return Err(RepositoryError::CheckoutFailed {
            rev: sha.to_string(),
            details: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(())
}

/// Removes a clone workspace. Missing directories are fine: cleanup after a
/// failed clone must not introduce its own failure.
pub fn remove_workspace(dest: &Path) -> Result<(), RepositoryError> {
    match std::fs::remove_dir_all(dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RepositoryError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitcmp::testrepo::{commit_file, git, head, init_repo};
    use tempfile::TempDir;

    #[test]
    fn workspace_id_is_deterministic() {
        let sha = Sha::new("a".repeat(40));
        let a = workspace_id("acme", "r-1", "feature", &sha);
        let b = workspace_id("acme", "r-1", "feature", &sha);
        assert_eq!(a, b);
        assert_ne!(a, workspace_id("acme", "r-1", "other", &sha));
    }

    #[test]
    fn clone_at_pins_to_commit() {
        let dir = TempDir::new().unwrap();
        let origin = init_repo(&dir);
        let pinned = head(&origin);
        // Advance the branch past the pinned commit.
        commit_file(&origin, "later.txt", "later\n", "Later work");

        let dest = dir.path().join("clones").join("ws-1");
        clone_at(&origin.display().to_string(), "main", &pinned, &dest).unwrap();

        assert_eq!(git(&dest, &["rev-parse", "HEAD"]), pinned.as_str());
        assert!(!dest.join("later.txt").exists());
    }

    #[test]
    fn clone_at_rejects_existing_destination() {
        let dir = TempDir::new().unwrap();
        let origin = init_repo(&dir);
        let pinned = head(&origin);

        let dest = dir.path().join("ws-2");
        std::fs::create_dir_all(&dest).unwrap();

        let err = clone_at(&origin.display().to_string(), "main", &pinned, &dest).unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyCloned { .. }));
    }

    #[test]
    fn remove_workspace_tolerates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("never-created");
        remove_workspace(&dest).unwrap();

        let real = dir.path().join("real");
        std::fs::create_dir_all(real.join("sub")).unwrap();
        remove_workspace(&real).unwrap();
        assert!(!real.exists());
    }
}
