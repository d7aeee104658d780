//! Per-branch actor.
//!
//! One actor per (repository, branch). Each push runs a clone/diff/cleanup
//! cycle inside a scoped session and dispatches a chat notification when the
//! changed-line total exceeds the repository threshold. Rebase intents only
//! materialize the workspace here; executing the rebase itself is the
//! activity layer's job (`gitcmp::rebase`), and the split is deliberate.
//!
//! Two independent monitors (stale branch, pull-request reminder) tick on
//! their own intervals. Their notification callbacks are not wired to any
//! backend yet; the ticks only log.
//!
//! External failures never kill the actor: every activity error is logged
//! and the handler proceeds with an empty result.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::gitcmp::{
    CompareError, DiffResult, RepositoryError, clone_at, diff, remove_workspace, workspace_id,
};
use crate::hooks::{HookError, HookRegistry};
use crate::session::{ScopedSession, SessionError};
use crate::types::{DiffNotification, PushEvent, RebaseEvent, RefAction, RefEvent, RepoEntity, Sha};

use super::BranchSignal;

/// Errors from one branch activity cycle. All of them are logged and
/// swallowed by the actor.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Compare(#[from] CompareError),
}

/// State machine for one tracked branch.
pub struct BranchActor {
    entity: RepoEntity,
    branch: String,

    /// Latest commit the branch is known to point at.
    head: Option<Sha>,

    /// Exit flag, polled once per loop iteration.
    done: bool,

    hooks: Arc<HookRegistry>,
    config: CoreConfig,
}

impl BranchActor {
    pub fn new(
        entity: RepoEntity,
        branch: String,
        hooks: Arc<HookRegistry>,
        config: CoreConfig,
    ) -> Self {
        BranchActor {
            entity,
            branch,
            head: None,
            done: false,
            hooks,
            config,
        }
    }

    /// Runs the actor loop until marked done, cancelled, or the channel
    /// closes. The exit flag is checked between handlers, never mid-handler.
    pub async fn run(mut self, mut rx: mpsc::Receiver<BranchSignal>, cancel: CancellationToken) {
        info!(repo = %self.entity, branch = %self.branch, "branch actor started");

        let mut stale_deadline = Instant::now() + self.config.stale_interval;
        let mut reminder_deadline = Instant::now() + self.config.reminder_interval;

        loop {
            if self.done {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                signal = rx.recv() => match signal {
                    Some(signal) => {
                        if matches!(signal, BranchSignal::Push(_)) {
                            // Branch activity: restart the staleness clock.
                            stale_deadline = Instant::now() + self.config.stale_interval;
                        }
                        self.handle(signal).await;
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(stale_deadline) => {
                    self.on_stale();
                    stale_deadline = Instant::now() + self.config.stale_interval;
                }
                _ = tokio::time::sleep_until(reminder_deadline) => {
                    self.on_reminder();
                    reminder_deadline = Instant::now() + self.config.reminder_interval;
                }
            }
        }

        info!(repo = %self.entity, branch = %self.branch, "branch actor stopped");
    }

    async fn handle(&mut self, signal: BranchSignal) {
        match signal {
            BranchSignal::Push(ev) => self.handle_push(ev).await,
            BranchSignal::Rebase(ev) => self.handle_rebase(ev).await,
            BranchSignal::Ref(ev) => self.handle_ref(ev),
            BranchSignal::Done => self.done = true,
        }
    }

    async fn handle_push(&mut self, ev: PushEvent) {
        self.head = Some(ev.head.clone());

        let result = match self.diff_cycle(&ev.head).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    repo = %self.entity,
                    branch = %self.branch,
                    error = %e,
                    "diff cycle failed, continuing with empty result"
                );
                return;
            }
        };

        let total = result.lines.total();
        if total <= self.entity.line_threshold {
            debug!(
                repo = %self.entity,
                branch = %self.branch,
                lines = total,
                threshold = self.entity.line_threshold,
                "diff under threshold"
            );
            return;
        }

        let notification = DiffNotification {
            org: self.entity.org.clone(),
            repo: self.entity.id.clone(),
            repo_name: self.entity.name.clone(),
            branch: self.branch.clone(),
            hook_kind: self.entity.hook_kind,
            chat_link: self.entity.chat_link.clone(),
            lines_added: result.lines.added,
            lines_removed: result.lines.removed,
            threshold: self.entity.line_threshold,
            head: ev.head,
        };

        // Notification failures are logged and swallowed; they never halt
        // event processing.
        match self.hooks.chat(self.entity.hook_kind) {
            Ok(chat) => {
                if let Err(e) = chat.notify_lines_exceed(&notification) {
                    warn!(repo = %self.entity, branch = %self.branch, error = %e, "diff notification failed");
                }
            }
            Err(e) => {
                warn!(repo = %self.entity, error = %e, "no chat notifier for diff notification");
            }
        }
    }

    /// Clone at the pushed commit, diff against the default branch, clean up.
    /// The whole cycle is pinned to one workspace by a scoped session.
    async fn diff_cycle(&self, head: &Sha) -> Result<DiffResult, ActivityError> {
        let url = self
            .hooks
            .source(self.entity.hook_kind)?
            .tokenized_clone_url(&self.entity)?;

        let id = workspace_id(
            self.entity.org.as_str(),
            self.entity.id.as_str(),
            &self.branch,
            head,
        );
        let session = ScopedSession::open(&id, &self.config).await?;

        let workspace = session.workspace().to_path_buf();
        let branch = self.branch.clone();
        let head = head.clone();
        let default_branch = self.entity.default_branch.clone();
        let result = session
            .execute(move || clone_diff_cleanup(&workspace, &url, &branch, &head, &default_branch))
            .await;
        session.close();

        result?
    }

    /// Materializes the workspace for a rebase intent: clone at the requested
    /// commit, then remove the clone. Rebase execution happens in the
    /// activity layer, not here.
    async fn handle_rebase(&mut self, ev: RebaseEvent) {
        debug!(
            repo = %self.entity,
            branch = %self.branch,
            head = %ev.head.short(),
            "rebase intent received, materializing workspace"
        );

        if let Err(e) = self.rebase_workspace(&ev).await {
            warn!(
                repo = %self.entity,
                branch = %self.branch,
                error = %e,
                "rebase workspace cycle failed"
            );
        }
    }

    async fn rebase_workspace(&self, ev: &RebaseEvent) -> Result<(), ActivityError> {
        let url = self
            .hooks
            .source(self.entity.hook_kind)?
            .tokenized_clone_url(&self.entity)?;

        let id = workspace_id(
            self.entity.org.as_str(),
            self.entity.id.as_str(),
            &ev.base,
            &ev.head,
        );
        let session = ScopedSession::open(&id, &self.config).await?;

        let workspace = session.workspace().to_path_buf();
        let branch = ev.base.clone();
        let head = ev.head.clone();
        let result = session
            .execute(move || -> Result<(), ActivityError> {
                clone_fresh(&workspace, &url, &branch, &head)?;
                remove_workspace(&workspace)?;
                Ok(())
            })
            .await;
        session.close();

        result?
    }

    fn handle_ref(&mut self, ev: RefEvent) {
        match ev.action {
            RefAction::Created => {
                debug!(repo = %self.entity, branch = %self.branch, "branch created");
            }
            RefAction::Deleted => {
                debug!(repo = %self.entity, branch = %self.branch, "branch deleted, marking done");
                self.done = true;
            }
        }
    }

    /// Stale-branch monitor callback. The notification side is not wired to
    /// any backend yet; the tick only records that the branch went quiet.
    fn on_stale(&self) {
        debug!(
            repo = %self.entity,
            branch = %self.branch,
            head = ?self.head.as_ref().map(Sha::short),
            "stale monitor tick"
        );
    }

    /// Pull-request reminder callback. Same gap as `on_stale`.
    fn on_reminder(&self) {
        debug!(repo = %self.entity, branch = %self.branch, "reminder monitor tick");
    }
}

/// Clones pinned to `head`, tolerating a leftover workspace from an earlier
/// attempt on the same replayable path.
fn clone_fresh(
    workspace: &Path,
    url: &str,
    branch: &str,
    head: &Sha,
) -> Result<(), ActivityError> {
    match clone_at(url, branch, head, workspace) {
        Ok(()) => Ok(()),
        Err(RepositoryError::AlreadyCloned { .. }) => {
            remove_workspace(workspace)?;
            clone_at(url, branch, head, workspace)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn clone_diff_cleanup(
    workspace: &Path,
    url: &str,
    branch: &str,
    head: &Sha,
    default_branch: &str,
) -> Result<DiffResult, ActivityError> {
    clone_fresh(workspace, url, branch, head)?;

    let from = format!("origin/{default_branch}");
    let result = diff(workspace, &from, head.as_str());

    if let Err(e) = remove_workspace(workspace) {
        warn!(workspace = %workspace.display(), error = %e, "workspace cleanup failed");
    }

    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitcmp::testrepo::{commit_file, git, init_repo};
    use crate::hooks::{RecordingChatNotifier, StaticCloneUrl};
    use crate::types::{EventId, HookKind};
    use tempfile::TempDir;

    /// Origin repo with `main` plus a feature branch that changes `extra`
    /// lines relative to main. Returns (workdir, feature head).
    fn origin_with_feature(dir: &TempDir, extra: usize) -> (std::path::PathBuf, Sha) {
        let workdir = init_repo(dir);
        git(&workdir, &["checkout", "-b", "feature"]);
        let content = "line\n".repeat(extra);
        let head = commit_file(&workdir, "bulk.txt", &content, "Bulk change");
        (workdir, head)
    }

    fn actor_under_test(
        dir: &TempDir,
        origin: &std::path::Path,
        threshold: u64,
    ) -> (BranchActor, Arc<RecordingChatNotifier>) {
        let recorder = Arc::new(RecordingChatNotifier::new());
        let hooks = Arc::new(
            HookRegistry::new()
                .register_source(
                    HookKind::GitHub,
                    Arc::new(StaticCloneUrl(origin.display().to_string())),
                )
                .register_chat(HookKind::GitHub, recorder.clone()),
        );

        let mut config = CoreConfig::new();
        config.workspace_base = dir.path().join("workspaces");

        let entity =
            RepoEntity::new("acme", "r-1", "api-server", "main").with_line_threshold(threshold);
        let actor = BranchActor::new(entity, "feature".to_string(), hooks, config);
        (actor, recorder)
    }

    async fn run_push(actor: BranchActor, head: Sha) {
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(actor.run(rx, cancel));

        let ev = PushEvent {
            event_id: EventId::new("d-1"),
            org: crate::types::OrgId::new("acme"),
            repo: crate::types::RepoId::new("r-1"),
            ref_name: "refs/heads/feature".to_string(),
            head,
        };
        tx.send(BranchSignal::Push(ev)).await.unwrap();
        tx.send(BranchSignal::Done).await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn push_over_threshold_sends_exactly_one_notification() {
        let dir = TempDir::new().unwrap();
        let (origin, head) = origin_with_feature(&dir, 120);
        let (actor, recorder) = actor_under_test(&dir, &origin, 100);

        run_push(actor, head.clone()).await;

        let sent = recorder.lines_exceeded();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].branch, "feature");
        assert_eq!(sent[0].lines_added, 120);
        assert_eq!(sent[0].lines_removed, 0);
        assert_eq!(sent[0].threshold, 100);
        assert_eq!(sent[0].head, head);
    }

    #[tokio::test]
    async fn push_under_threshold_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let (origin, head) = origin_with_feature(&dir, 80);
        let (actor, recorder) = actor_under_test(&dir, &origin, 100);

        run_push(actor, head).await;

        assert!(recorder.lines_exceeded().is_empty());
    }

    #[tokio::test]
    async fn missing_source_hook_is_survivable() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(RecordingChatNotifier::new());
        let hooks =
            Arc::new(HookRegistry::new().register_chat(HookKind::GitHub, recorder.clone()));
        let mut config = CoreConfig::new();
        config.workspace_base = dir.path().join("workspaces");
        let entity = RepoEntity::new("acme", "r-1", "api-server", "main").with_line_threshold(1);
        let actor = BranchActor::new(entity, "feature".to_string(), hooks, config);

        // The diff cycle fails on hook lookup; the actor logs it and keeps
        // running until told it is done.
        run_push(actor, Sha::new("f".repeat(40))).await;
        assert!(recorder.lines_exceeded().is_empty());
    }

    #[tokio::test]
    async fn branch_delete_ref_marks_actor_done() {
        let dir = TempDir::new().unwrap();
        let (origin, _head) = origin_with_feature(&dir, 10);
        let (actor, _recorder) = actor_under_test(&dir, &origin, 100);

        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(actor.run(rx, cancel));

        tx.send(BranchSignal::Ref(RefEvent {
            event_id: EventId::new("d-2"),
            org: crate::types::OrgId::new("acme"),
            repo: crate::types::RepoId::new("r-1"),
            ref_name: "refs/heads/feature".to_string(),
            ref_type: crate::types::RefType::Branch,
            action: RefAction::Deleted,
        }))
        .await
        .unwrap();

        // The actor exits on its own; no Done signal needed.
        task.await.unwrap();
    }
}
