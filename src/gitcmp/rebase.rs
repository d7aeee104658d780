//! Rebase with conflict classification, and author-preserving cherry-pick.
//!
//! Rebase outcomes are reported as a typed status, never through the error
//! channel: conflicts are a common, expected result the caller branches on.
//! Whenever an attempt fails the rebase is aborted so the workspace is left
//! clean for the next attempt.

use std::path::Path;

use tracing::warn;

use crate::types::Sha;

use super::{
    CherryPickError, RebaseOp, RebaseResult, RebaseStatus, git_command, rev_parse, run_git,
    run_git_stdout,
};

/// Two-letter porcelain codes that mark an unmerged path.
const UNMERGED_CODES: [&str; 7] = ["UU", "AA", "DU", "UD", "UA", "AU", "DD"];

/// Attempts to rebase the current branch onto `base`.
///
/// - Success with an unchanged head reports `UpToDate`.
/// - A stop on unmerged paths reports `Conflicts` with the file list; the
///   rebase is aborted so no in-progress state remains.
/// - Any other failure reports `Failure` with the raw command output, also
///   aborted.
/// - A rebase left in progress by an earlier attempt is aborted up front and
///   reported as `Aborted`; the caller may retry on the restored workspace.
///
/// Failures to even spawn git are folded into `Failure`: a rebase attempt
/// always yields a result the actor can log and move past.
pub fn rebase(workdir: &Path, base: &str) -> RebaseResult {
    if rebase_in_progress(workdir) {
        warn!(workdir = %workdir.display(), "found rebase in progress, aborting it");
        abort_rebase(workdir);
        return RebaseResult {
            status: RebaseStatus::Aborted,
            head: None,
            conflicts: Vec::new(),
            ops: Vec::new(),
            error: Some("previous rebase left in progress; aborted".to_string()),
        };
    }

    let ops = replay_plan(workdir, base);
    let old_head = match rev_parse(workdir, "HEAD") {
        Ok(sha) => sha,
        Err(e) => return failure(ops, e.to_string()),
    };

    let output = match git_command(workdir).args(["rebase", base]).output() {
        Ok(out) => out,
        Err(e) => return failure(ops, e.to_string()),
    };

    if output.status.success() {
        let new_head = match rev_parse(workdir, "HEAD") {
            Ok(sha) => sha,
            Err(e) => return failure(ops, e.to_string()),
        };
        if new_head == old_head {
            return RebaseResult {
                status: RebaseStatus::UpToDate,
                head: Some(new_head),
                conflicts: Vec::new(),
                ops,
                error: None,
            };
        }
        let ops = ops
            .into_iter()
            .map(|op| RebaseOp { applied: true, ..op })
            .collect();
        return RebaseResult {
            status: RebaseStatus::Success,
            head: Some(new_head),
            conflicts: Vec::new(),
            ops,
            error: None,
        };
    }

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    let conflicts = conflicted_files(workdir);
    if !conflicts.is_empty() {
        let status = if abort_rebase(workdir) {
            RebaseStatus::Conflicts
        } else {
            // The workspace is stuck mid-rebase; surface that distinctly.
            RebaseStatus::Partial
        };
        return RebaseResult {
            status,
            head: None,
            conflicts,
            ops,
            error: (status == RebaseStatus::Partial).then(|| combined.clone()),
        };
    }

    abort_rebase(workdir);
    failure(ops, combined)
}

fn failure(ops: Vec<RebaseOp>, error: String) -> RebaseResult {
    RebaseResult {
        status: RebaseStatus::Failure,
        head: None,
        conflicts: Vec::new(),
        ops,
        error: Some(error),
    }
}

/// Lists the commits a rebase onto `base` would replay, oldest first.
///
/// Best effort: an unresolvable base yields an empty plan and the rebase
/// itself reports the real failure.
fn replay_plan(workdir: &Path, base: &str) -> Vec<RebaseOp> {
    let range = format!("{base}..HEAD");
    match run_git_stdout(workdir, &["rev-list", "--reverse", &range]) {
        Ok(out) => out
            .lines()
            .map(|line| RebaseOp {
                commit: Sha::new(line),
                applied: false,
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// True if the workspace has a rebase in progress.
fn rebase_in_progress(workdir: &Path) -> bool {
    let git_dir = match run_git_stdout(workdir, &["rev-parse", "--git-dir"]) {
        Ok(d) => workdir.join(d),
        Err(_) => return false,
    };
    git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists()
}

/// Aborts an in-progress rebase. Returns true if the abort succeeded.
fn abort_rebase(workdir: &Path) -> bool {
    match run_git(workdir, &["rebase", "--abort"]) {
        Ok(_) => true,
        Err(e) => {
            warn!(workdir = %workdir.display(), error = %e, "rebase abort failed");
            false
        }
    }
}

/// Parses `git status --porcelain` for unmerged paths.
fn conflicted_files(workdir: &Path) -> Vec<String> {
    let output = match run_git_stdout(workdir, &["status", "--porcelain"]) {
        Ok(out) => out,
        Err(e) => {
            warn!(workdir = %workdir.display(), error = %e, "status inspection failed");
            return Vec::new();
        }
    };

    output
        .lines()
        .filter_map(|line| {
            let code = line.get(..2)?;
            if UNMERGED_CODES.contains(&code) {
                Some(line.get(3..)?.to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Re-applies the tree of `hash` as a new commit on `branch`, preserving the
/// original author identity, then leaves the branch checked out at the new
/// commit.
///
/// Each sub-step fails distinctly (checkout, commit, post-commit checkout) so
/// callers can tell which stage broke.
pub fn cherry_pick(workdir: &Path, branch: &str, hash: &Sha) -> Result<Sha, CherryPickError> {
    run_git(workdir, &["checkout", branch]).map_err(|e| CherryPickError::Checkout {
        branch: branch.to_string(),
        details: e.to_string(),
    })?;

    let commit_err = |e: super::CompareError| CherryPickError::Commit {
        hash: hash.to_string(),
        details: e.to_string(),
    };

    let author = run_git_stdout(
        workdir,
        &["log", "-1", "--format=%an%x00%ae%x00%aI", hash.as_str()],
    )
    .map_err(commit_err)?;
    let mut parts = author.split('\0');
    let (name, email, date) = (
        parts.next().unwrap_or_default().to_string(),
        parts.next().unwrap_or_default().to_string(),
        parts.next().unwrap_or_default().to_string(),
    );

    let subject =
        run_git_stdout(workdir, &["log", "-1", "--format=%s", hash.as_str()]).map_err(commit_err)?;

    let tree = format!("{}^{{tree}}", hash);
    let output = git_command(workdir)
        .args(["commit-tree", &tree, "-p", "HEAD", "-m", &subject])
        .env("GIT_AUTHOR_NAME", &name)
        .env("GIT_AUTHOR_EMAIL", &email)
        .env("GIT_AUTHOR_DATE", &date)
        .env("GIT_COMMITTER_NAME", &name)
        .env("GIT_COMMITTER_EMAIL", &email)
        .output()
        .map_err(|e| CherryPickError::Commit {
            hash: hash.to_string(),
            details: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(CherryPickError::Commit {
            hash: hash.to_string(),
            details: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }
    let new_sha = Sha::new(String::from_utf8_lossy(&output.stdout).trim().to_string());

    run_git(workdir, &["checkout", "-B", branch, new_sha.as_str()]).map_err(|e| {
        CherryPickError::CheckoutPost {
            branch: branch.to_string(),
            details: e.to_string(),
        }
    })?;

    Ok(new_sha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitcmp::testrepo::{commit_file, git, head, init_repo};
    use tempfile::TempDir;

    #[test]
    fn rebase_succeeds_on_diverged_branches() {
        let dir = TempDir::new().unwrap();
        let workdir = init_repo(&dir);

        git(&workdir, &["checkout", "-b", "feature"]);
        let old_head = commit_file(&workdir, "f.txt", "feature\n", "Feature work");
        git(&workdir, &["checkout", "main"]);
        commit_file(&workdir, "m.txt", "mainline\n", "Main work");
        git(&workdir, &["checkout", "feature"]);

        let result = rebase(&workdir, "main");

        assert_eq!(result.status, RebaseStatus::Success);
        let new_head = result.head.unwrap();
        assert_ne!(new_head, old_head);
        assert_eq!(result.ops.len(), 1);
        assert!(result.ops[0].applied);
        assert!(workdir.join("f.txt").exists());
        assert!(workdir.join("m.txt").exists());
    }

    #[test]
    fn rebase_onto_contained_base_is_up_to_date() {
        let dir = TempDir::new().unwrap();
        let workdir = init_repo(&dir);
        let first = head(&workdir);
        commit_file(&workdir, "more.txt", "more\n", "More work");
        let before = head(&workdir);

        let result = rebase(&workdir, first.as_str());

        assert_eq!(result.status, RebaseStatus::UpToDate);
        assert_eq!(result.head, Some(before));
    }

    #[test]
    fn rebase_conflict_reports_files_and_aborts() {
        let dir = TempDir::new().unwrap();
        let workdir = init_repo(&dir);
        commit_file(&workdir, "conflict.txt", "original\n", "Add conflict.txt");

        git(&workdir, &["checkout", "-b", "feature"]);
        let feature_head = commit_file(&workdir, "conflict.txt", "feature side\n", "Feature edit");
        git(&workdir, &["checkout", "main"]);
        commit_file(&workdir, "conflict.txt", "main side\n", "Main edit");
        git(&workdir, &["checkout", "feature"]);

        let result = rebase(&workdir, "main");

        assert_eq!(result.status, RebaseStatus::Conflicts);
        assert_eq!(result.conflicts, vec!["conflict.txt".to_string()]);
        assert!(result.is_conflict());

        // The abort restored the workspace: no rebase in progress, branch
        // back at its pre-rebase head, no unmerged paths.
        let git_dir = workdir.join(".git");
        assert!(!git_dir.join("rebase-merge").exists());
        assert!(!git_dir.join("rebase-apply").exists());
        assert_eq!(head(&workdir), feature_head);
        assert_eq!(git(&workdir, &["status", "--porcelain"]), "");
    }

    #[test]
    fn rebase_onto_unknown_ref_is_failure_not_error() {
        let dir = TempDir::new().unwrap();
        let workdir = init_repo(&dir);

        let result = rebase(&workdir, "no-such-base");

        assert_eq!(result.status, RebaseStatus::Failure);
        assert!(result.error.is_some());
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn cherry_pick_preserves_author_and_tree() {
        let dir = TempDir::new().unwrap();
        let workdir = init_repo(&dir);

        git(&workdir, &["checkout", "-b", "feature"]);
        git(&workdir, &["config", "user.name", "Alice"]);
        git(&workdir, &["config", "user.email", "alice@example.com"]);
        let picked = commit_file(&workdir, "picked.txt", "picked content\n", "Picked change");
        git(&workdir, &["config", "user.name", "Test"]);
        git(&workdir, &["config", "user.email", "test@test.com"]);

        let new_head = cherry_pick(&workdir, "main", &picked).unwrap();

        // Branch is checked out at the new commit.
        assert_eq!(git(&workdir, &["rev-parse", "--abbrev-ref", "HEAD"]), "main");
        assert_eq!(head(&workdir), new_head);

        // Author identity carried over from the source commit.
        assert_eq!(git(&workdir, &["log", "-1", "--format=%an"]), "Alice");
        assert_eq!(
            git(&workdir, &["log", "-1", "--format=%ae"]),
            "alice@example.com"
        );

        // The new commit snapshots the source commit's tree.
        let src_tree = git(&workdir, &["rev-parse", &format!("{}^{{tree}}", picked)]);
        let new_tree = git(&workdir, &["rev-parse", "HEAD^{tree}"]);
        assert_eq!(src_tree, new_tree);
    }

    #[test]
    fn cherry_pick_fails_distinctly_on_bad_branch() {
        let dir = TempDir::new().unwrap();
        let workdir = init_repo(&dir);
        let sha = head(&workdir);

        let err = cherry_pick(&workdir, "no-such-branch", &sha).unwrap_err();
        assert!(matches!(err, CherryPickError::Checkout { .. }));
    }
}
