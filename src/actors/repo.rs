//! Per-repository root actor.
//!
//! The repo actor is the single entry point for a repository's inbound
//! events. It owns the branch-trigger bookkeeping and routes everything else:
//! pushes and ref changes to branch actors, merge-queue entries to the trunk,
//! and a rebase fan-out to every triggered branch when the default branch
//! moves.
//!
//! Forwarding is best-effort with at-least-once semantics: a trigger is
//! recorded before delivery to the branch actor is confirmed, and a failed
//! forward is logged without rolling the trigger back.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::CoreConfig;
use crate::pulse::PulseSink;
use crate::types::{PushEvent, RebaseEvent, RefAction, RefEvent, RefType, branch_name_from_ref};
use crate::types::{EventId, RepoEntity};

use super::registry::ActorRegistry;
use super::{BranchSignal, QueryError, RepoSignal, TrunkSignal};

/// Root state machine for one repository.
pub struct RepoActor {
    entity: RepoEntity,

    /// Branch name to the id of the event that created the trigger. A branch
    /// has at most one active trigger at a time.
    triggers: HashMap<String, EventId>,

    registry: ActorRegistry,
    pulse: Arc<dyn PulseSink>,
    config: CoreConfig,

    /// Signals handled since the last history compaction.
    processed: u64,
}

impl RepoActor {
    pub fn new(
        entity: RepoEntity,
        registry: ActorRegistry,
        pulse: Arc<dyn PulseSink>,
        config: CoreConfig,
    ) -> Self {
        RepoActor {
            entity,
            triggers: HashMap::new(),
            registry,
            pulse,
            config,
            processed: 0,
        }
    }

    /// Runs the actor loop: one signal at a time, until cancellation or
    /// channel close.
    pub async fn run(mut self, mut rx: mpsc::Receiver<RepoSignal>, cancel: CancellationToken) {
        info!(repo = %self.entity, "repo actor started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                signal = rx.recv() => match signal {
                    Some(signal) => self.handle(signal).await,
                    None => break,
                }
            }

            self.processed += 1;
            if self.processed >= self.config.history_limit {
                // The continue-as-new point: state (triggers) carries over,
                // accumulated handler history does not.
                debug!(repo = %self.entity, "compacting repo actor history");
                self.processed = 0;
            }
        }

        info!(repo = %self.entity, "repo actor stopped");
    }

    async fn handle(&mut self, signal: RepoSignal) {
        match signal {
            RepoSignal::Push(ev) => self.handle_push(ev).await,
            RepoSignal::Ref(ev) => self.handle_ref(ev).await,
            RepoSignal::MergeQueue(ev) => {
                // Forwarded unmodified; the trunk owns all queue decisions.
                if let Err(e) = self
                    .registry
                    .signal_trunk(&self.entity, TrunkSignal::MergeQueue(ev))
                    .await
                {
                    warn!(repo = %self.entity, error = %e, "merge-queue forward failed");
                }
            }
            // Received but not acted on: trigger logic for pull-request
            // activity is not wired up. Consuming them keeps the signal
            // contract total.
            RepoSignal::PullRequest(ev) => {
                trace!(repo = %self.entity, pr = %ev.number, action = %ev.action, "pull request event consumed");
            }
            RepoSignal::Review(ev) => {
                trace!(repo = %self.entity, pr = %ev.number, "review event consumed");
            }
            RepoSignal::ReviewComment(ev) => {
                trace!(repo = %self.entity, pr = %ev.number, "review comment event consumed");
            }
            RepoSignal::BranchTrigger { branch, reply } => {
                let result = self
                    .triggers
                    .get(&branch)
                    .cloned()
                    .ok_or(QueryError::TriggerNotFound(branch));
                // A dropped receiver just means the caller stopped waiting.
                let _ = reply.send(result);
            }
        }
    }

    async fn handle_push(&mut self, ev: PushEvent) {
        let Some(branch) = branch_name_from_ref(&ev.ref_name) else {
            warn!(repo = %self.entity, ref_name = %ev.ref_name, "push to non-branch ref ignored");
            return;
        };
        let branch = branch.to_string();

        if branch == self.entity.default_branch {
            self.fan_out_rebase(&ev);
            return;
        }

        // Record or refresh the trigger, then forward. The trigger stays even
        // if the forward fails.
        self.triggers.insert(branch.clone(), ev.event_id.clone());
        debug!(repo = %self.entity, branch = %branch, "recorded branch trigger");

        if let Err(e) = self
            .registry
            .signal_branch(&self.entity, &branch, BranchSignal::Push(ev))
            .await
        {
            warn!(repo = %self.entity, branch = %branch, error = %e, "push forward failed");
        }
    }

    /// Broadcasts a rebase intent to every triggered branch. One concurrent
    /// task per branch; completion is not awaited, so ordering between
    /// branches is unspecified.
    fn fan_out_rebase(&self, ev: &PushEvent) {
        debug!(
            repo = %self.entity,
            head = %ev.head.short(),
            branches = self.triggers.len(),
            "default branch moved, fanning out rebase intents"
        );

        for (branch, trigger_id) in self.triggers.clone() {
            let intent = RebaseEvent::from_push(ev, &branch, Some(trigger_id));
            let registry = self.registry.clone();
            let entity = self.entity.clone();
            let pulse = self.pulse.clone();

            tokio::spawn(async move {
                // Durably record the intent first; a failed record is logged
                // and the forward still happens.
                if let Err(e) = pulse.persist(&intent) {
                    warn!(repo = %entity, branch = %intent.base, error = %e, "pulse record failed");
                }
                let branch = intent.base.clone();
                if let Err(e) = registry
                    .signal_branch(&entity, &branch, BranchSignal::Rebase(intent))
                    .await
                {
                    warn!(repo = %entity, branch = %branch, error = %e, "rebase forward failed");
                }
            });
        }
    }

    async fn handle_ref(&mut self, ev: RefEvent) {
        if ev.ref_type != RefType::Branch {
            trace!(repo = %self.entity, ref_name = %ev.ref_name, "non-branch ref event ignored");
            return;
        }
        let Some(branch) = branch_name_from_ref(&ev.ref_name) else {
            warn!(repo = %self.entity, ref_name = %ev.ref_name, "malformed branch ref ignored");
            return;
        };
        let branch = branch.to_string();

        match ev.action {
            RefAction::Created => {
                self.triggers.insert(branch.clone(), ev.event_id.clone());
                debug!(repo = %self.entity, branch = %branch, "branch created, trigger recorded");
            }
            RefAction::Deleted => {
                self.triggers.remove(&branch);
                debug!(repo = %self.entity, branch = %branch, "branch deleted, trigger removed");
            }
        }

        if let Err(e) = self
            .registry
            .signal_branch(&self.entity, &branch, BranchSignal::Ref(ev))
            .await
        {
            warn!(repo = %self.entity, branch = %branch, error = %e, "ref forward failed");
        }
    }
}
