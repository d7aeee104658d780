//! Git comparison and workspace operations.
//!
//! This module implements the external-process git work the branch and trunk
//! actors rely on:
//! - Workspace management (clone pinned to a commit, cleanup)
//! - Diff between two revisions (file lists, line totals, patch text)
//! - Merge-base lookup ("ancestor")
//! - Rebase with conflict classification and automatic abort
//! - Cherry-pick that preserves the original author identity
//!
//! All operations shell out to `git` with a clean environment (no system or
//! user config) so behavior is reproducible across workers.

pub mod diff;
pub mod rebase;
pub mod workspace;

use std::path::Path;
use std::process::Output;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Sha;

pub use diff::{ancestor, diff, resolve_commit};
pub use rebase::{cherry_pick, rebase};
pub use workspace::{clone_at, remove_workspace, workspace_id};

/// Errors from revision resolution and comparison.
#[derive(Debug, Error)]
pub enum CompareError {
    /// A revision could not be resolved at all.
    #[error("cannot resolve revision {rev}: {details}")]
    Resolve { rev: String, details: String },

    /// A revision resolved to something other than a commit (tree, annotated
    /// tag object, blob).
    #[error("revision {rev} is not a commit (found {kind})")]
    NotACommit { rev: String, kind: String },

    /// Two commits share no history.
    #[error("no common ancestor between {a} and {b}")]
    NoCommonAncestor { a: String, b: String },

    /// A git command failed.
    #[error("git command failed: {command}\nstderr: {stderr}")]
    Command { command: String, stderr: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from workspace clone/cleanup.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The destination already holds a clone.
    #[error("already cloned: {path}")]
    AlreadyCloned { path: String },

    /// The clone itself failed.
    #[error("clone failed: {details}")]
    CloneFailed { details: String },

    /// Checking out the pinned commit failed.
    #[error("checkout of {rev} failed: {details}")]
    CheckoutFailed { rev: String, details: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from cherry-pick, one variant per sub-step so callers can tell
/// which stage failed.
#[derive(Debug, Error)]
pub enum CherryPickError {
    /// Checking out the target branch failed.
    #[error("checkout of {branch} failed: {details}")]
    Checkout { branch: String, details: String },

    /// Reading the source commit or creating the new commit failed.
    #[error("commit of {hash} failed: {details}")]
    Commit { hash: String, details: String },

    /// Re-checking out the branch at the new commit failed.
    #[error("post-commit checkout of {branch} failed: {details}")]
    CheckoutPost { branch: String, details: String },
}

/// Result type for comparison operations.
pub type CompareResult<T> = Result<T, CompareError>;

/// File-level change sets between two revisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChanges {
    pub added: Vec<String>,
    pub deleted: Vec<String>,
    pub modified: Vec<String>,
    /// (old path, new path) pairs.
    pub renamed: Vec<(String, String)>,
}

/// Line-level totals between two revisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineStats {
    pub added: u64,
    pub removed: u64,
}

impl LineStats {
    pub fn total(&self) -> u64 {
        self.added + self.removed
    }
}

/// The outcome of comparing two revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// The resolved "from" commit.
    pub base: Sha,

    /// The resolved "to" commit.
    pub head: Sha,

    pub files: FileChanges,
    pub lines: LineStats,

    /// Unified diff text.
    pub patch: String,

    /// The merge-base of the two commits, when one exists.
    ///
    /// Present for almost any two commits that share history; this marks the
    /// divergence point, not an unresolved merge conflict. Informational.
    pub conflict_at: Option<Sha>,

    /// True whenever `conflict_at` is set. See `conflict_at`.
    pub has_conflict: bool,
}

/// Typed status of a rebase attempt. Conflicts are an expected outcome the
/// caller branches on, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebaseStatus {
    /// Rebase completed and moved the head.
    Success,
    /// Rebase failed for a non-conflict reason; see `error`.
    Failure,
    /// Rebase stopped on unmerged paths and was aborted; see `conflicts`.
    Conflicts,
    /// The branch already contained the base; nothing to do.
    UpToDate,
    /// A previous attempt had left a rebase in progress; it was aborted and
    /// the workspace restored before anything else ran.
    Aborted,
    /// Conflicts were found but the abort itself failed, leaving the
    /// workspace mid-rebase. Requires manual cleanup.
    Partial,
}

/// One commit the rebase attempt planned to replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseOp {
    pub commit: Sha,
    /// True once the commit has been replayed onto the new base. After an
    /// abort the workspace is restored, so nothing counts as applied.
    pub applied: bool,
}

/// The outcome of a rebase attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseResult {
    pub status: RebaseStatus,

    /// The head after a successful rebase.
    pub head: Option<Sha>,

    /// Paths left unmerged when the attempt stopped.
    pub conflicts: Vec<String>,

    /// The per-commit replay plan, in order.
    pub ops: Vec<RebaseOp>,

    /// Raw command output for `Failure` and `Partial`.
    pub error: Option<String>,
}

impl RebaseResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RebaseStatus::Success | RebaseStatus::UpToDate)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.status, RebaseStatus::Conflicts | RebaseStatus::Partial)
    }
}

/// Create a git Command with clean environment (no system/user config).
///
/// This ensures consistent behavior across different machines by ignoring
/// system and user git configuration (e.g., rerere, hooks, aliases).
pub(crate) fn git_command(workdir: &Path) -> std::process::Command {
    use std::process::Command;

    let mut cmd = Command::new("git");
    cmd.current_dir(workdir);

    // Disable system and user config for reproducible behavior
    cmd.env("GIT_CONFIG_NOSYSTEM", "1");
    cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");

    // Disable terminal prompts
    cmd.env("GIT_TERMINAL_PROMPT", "0");

    cmd
}

/// Run a git command in the given working directory.
///
/// Returns the command output on success, or a `CompareError` on failure.
pub(crate) fn run_git(workdir: &Path, args: &[&str]) -> CompareResult<Output> {
    let output = git_command(workdir).args(args).output()?;

    if output.status.success() {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let command = format!("git {}", args.join(" "));
        Err(CompareError::Command { command, stderr })
    }
}

/// Run a git command and return trimmed stdout as a string.
pub(crate) fn run_git_stdout(workdir: &Path, args: &[&str]) -> CompareResult<String> {
    let output = run_git(workdir, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Get the SHA of a revision without type checking.
pub(crate) fn rev_parse(workdir: &Path, rev: &str) -> CompareResult<Sha> {
    let sha = run_git_stdout(workdir, &["rev-parse", "--verify", "--quiet", rev]).map_err(
        |e| match e {
            CompareError::Command { stderr, .. } => CompareError::Resolve {
                rev: rev.to_string(),
                details: stderr,
            },
            other => other,
        },
    )?;
    Ok(Sha::new(sha))
}

/// Shared test fixtures: throwaway repositories driven through the same git
/// helpers the production code uses.
#[cfg(test)]
pub(crate) mod testrepo {
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    use super::git_command;
    use crate::types::Sha;

    pub fn git(workdir: &Path, args: &[&str]) -> String {
        let output = git_command(workdir)
            .args(args)
            .output()
            .expect("spawn git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Initializes a repository with one commit on `main`.
    pub fn init_repo(dir: &TempDir) -> PathBuf {
        let workdir = dir.path().join("repo");
        std::fs::create_dir_all(&workdir).unwrap();
        git(&workdir, &["init", "-b", "main"]);
        git(&workdir, &["config", "user.email", "test@test.com"]);
        git(&workdir, &["config", "user.name", "Test"]);
        std::fs::write(workdir.join("README.md"), "# Test\n").unwrap();
        git(&workdir, &["add", "."]);
        git(&workdir, &["commit", "-m", "Initial commit"]);
        workdir
    }

    /// Writes a file and commits it, returning the new head.
    pub fn commit_file(workdir: &Path, name: &str, content: &str, message: &str) -> Sha {
        let path = workdir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
        git(workdir, &["add", "."]);
        git(workdir, &["commit", "-m", message]);
        Sha::new(git(workdir, &["rev-parse", "HEAD"]))
    }

    pub fn head(workdir: &Path) -> Sha {
        Sha::new(git(workdir, &["rev-parse", "HEAD"]))
    }
}
