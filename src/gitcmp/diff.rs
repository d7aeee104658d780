//! Diff and merge-base computation between two revisions.

use std::path::Path;

use crate::types::Sha;

use super::{
    CompareError, CompareResult, DiffResult, FileChanges, LineStats, git_command, rev_parse,
    run_git_stdout,
};

/// Resolves a revision to a commit.
///
/// Rejects revisions that resolve to non-commit objects (trees, annotated tag
/// objects, blobs); the caller gets an error naming the revision it passed.
pub fn resolve_commit(workdir: &Path, rev: &str) -> CompareResult<Sha> {
    let sha = rev_parse(workdir, rev)?;
    let kind = run_git_stdout(workdir, &["cat-file", "-t", sha.as_str()])?;
    if kind != "commit" {
        return Err(CompareError::NotACommit {
            rev: rev.to_string(),
            kind,
        });
    }
    Ok(sha)
}

/// Computes the diff between two revisions.
///
/// File-level change sets come from the patch's per-file entries: a file
/// present only in `to` is added, only in `from` is deleted, present in both
/// under different paths is renamed, otherwise modified. Line totals are the
/// summed per-file insertion and deletion counts.
///
/// The merge-base of the two commits, when one exists, is recorded as
/// `conflict_at` with `has_conflict` set. This marks the divergence point of
/// the pair, not an actual unresolved conflict; callers treat it as
/// informational.
pub fn diff(workdir: &Path, from: &str, to: &str) -> CompareResult<DiffResult> {
    let base = resolve_commit(workdir, from)?;
    let head = resolve_commit(workdir, to)?;

    let patch = run_git_stdout(workdir, &["diff", base.as_str(), head.as_str()])?;

    let name_status = run_git_stdout(
        workdir,
        &["diff", "--name-status", "-M", base.as_str(), head.as_str()],
    )?;
    let files = parse_name_status(&name_status);

    let numstat = run_git_stdout(
        workdir,
        &["diff", "--numstat", "-M", base.as_str(), head.as_str()],
    )?;
    let lines = parse_numstat(&numstat);

    let conflict_at = merge_base(workdir, &base, &head)?;
    let has_conflict = conflict_at.is_some();

    Ok(DiffResult {
        base,
        head,
        files,
        lines,
        patch,
        conflict_at,
        has_conflict,
    })
}

/// Returns the first merge-base commit of two revisions.
///
/// Fails with `NoCommonAncestor` when the two commits share no history.
pub fn ancestor(workdir: &Path, a: &str, b: &str) -> CompareResult<Sha> {
    let ca = resolve_commit(workdir, a)?;
    let cb = resolve_commit(workdir, b)?;
    merge_base(workdir, &ca, &cb)?.ok_or_else(|| CompareError::NoCommonAncestor {
        a: ca.to_string(),
        b: cb.to_string(),
    })
}

/// Looks up the merge-base of two commits.
///
/// Exit 0 yields the base, exit 1 means no common ancestor; anything else is
/// a command failure.
fn merge_base(workdir: &Path, a: &Sha, b: &Sha) -> CompareResult<Option<Sha>> {
    let output = git_command(workdir)
        .args(["merge-base", a.as_str(), b.as_str()])
        .output()?;

    match output.status.code() {
        Some(0) => {
            let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
            Ok(Some(Sha::new(sha)))
        }
        Some(1) => Ok(None),
        _ => {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            Err(CompareError::Command {
                command: format!("git merge-base {} {}", a, b),
                stderr,
            })
        }
    }
}

/// Parses `git diff --name-status -M` output into file change sets.
fn parse_name_status(output: &str) -> FileChanges {
    let mut files = FileChanges::default();

    for line in output.lines() {
        let mut fields = line.split('\t');
        let Some(status) = fields.next() else {
            continue;
        };
        match status.chars().next() {
            Some('A') => {
                if let Some(path) = fields.next() {
                    files.added.push(path.to_string());
                }
            }
            Some('D') => {
                if let Some(path) = fields.next() {
                    files.deleted.push(path.to_string());
                }
            }
            Some('R') => {
                if let (Some(old), Some(new)) = (fields.next(), fields.next()) {
                    files.renamed.push((old.to_string(), new.to_string()));
                }
            }
            // Modifications, type changes, and copies all land in modified;
            // for copies the source is unchanged and the target is new text.
            Some(_) => {
                if let Some(path) = fields.last() {
                    files.modified.push(path.to_string());
                }
            }
            None => {}
        }
    }

    files
}

/// Parses `git diff --numstat` output into line totals.
///
/// Binary entries report "-" counts and are skipped.
fn parse_numstat(output: &str) -> LineStats {
    let mut lines = LineStats::default();

    for line in output.lines() {
        let mut fields = line.split('\t');
        let (Some(added), Some(removed)) = (fields.next(), fields.next()) else {
            continue;
        };
        if let (Ok(a), Ok(r)) = (added.parse::<u64>(), removed.parse::<u64>()) {
            lines.added += a;
            lines.removed += r;
        }
    }

    lines
}
