//! Per-repository trunk actor: the merge train.
//!
//! One instance per repository, created lazily on the first merge-queue
//! signal. The actor owns a `Sequencer` keyed by pull request number and runs
//! two concerns in one loop: applying queue signals (append, priority insert,
//! removal) and draining the train.
//!
//! The drain side is intended to host the ahead-of-line cycle: rebase each
//! queued candidate onto a shadow integration branch, test, and merge in
//! sequencer order. That cycle is not implemented; dequeued entries are only
//! logged against the in-flight list so the gap stays visible in the
//! telemetry rather than being silently invented here.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::CoreConfig;
use crate::sequencer::Sequencer;
use crate::types::{EventId, MergeQueueAction, MergeQueueEvent, PrNumber, RepoEntity, Sha};

use super::TrunkSignal;

/// One queued merge candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeQueueEntry {
    pub number: PrNumber,
    pub branch: String,
    pub head: Sha,
    pub priority: bool,
    pub event_id: EventId,
}

impl From<&MergeQueueEvent> for MergeQueueEntry {
    fn from(ev: &MergeQueueEvent) -> Self {
        MergeQueueEntry {
            number: ev.number,
            branch: ev.branch.clone(),
            head: ev.head.clone(),
            priority: ev.priority,
            event_id: ev.event_id.clone(),
        }
    }
}

/// State machine for one repository's merge train.
pub struct TrunkActor {
    entity: RepoEntity,

    /// The train, keyed by pull request number.
    queue: Sequencer<PrNumber, MergeQueueEntry>,

    /// Entries currently being merge-tested.
    in_flight: Vec<MergeQueueEntry>,

    /// Exit flag, polled once per loop iteration.
    done: bool,

    config: CoreConfig,
}

impl TrunkActor {
    pub fn new(entity: RepoEntity, config: CoreConfig) -> Self {
        TrunkActor {
            entity,
            queue: Sequencer::new(),
            in_flight: Vec::new(),
            done: false,
            config,
        }
    }

    /// Runs the actor loop: queue signals and the drain tick, one at a time.
    pub async fn run(mut self, mut rx: mpsc::Receiver<TrunkSignal>, cancel: CancellationToken) {
        info!(repo = %self.entity, "trunk actor started");

        loop {
            if self.done {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                signal = rx.recv() => match signal {
                    Some(TrunkSignal::MergeQueue(ev)) => self.handle_queue(ev),
                    Some(TrunkSignal::Done) => self.done = true,
                    None => break,
                },
                _ = tokio::time::sleep(self.config.drain_tick), if !self.queue.is_empty() => {
                    self.drain_next();
                }
            }
        }

        info!(repo = %self.entity, "trunk actor stopped");
    }

    fn handle_queue(&mut self, ev: MergeQueueEvent) {
        match ev.action {
            MergeQueueAction::Removed => {
                self.queue.remove(&ev.number);
                debug!(repo = %self.entity, pr = %ev.number, "merge queue entry removed");
            }
            MergeQueueAction::Queued => {
                let entry = MergeQueueEntry::from(&ev);
                if ev.priority {
                    self.queue.priority(ev.number, entry);
                    debug!(repo = %self.entity, pr = %ev.number, "merge queue entry inserted at head");
                } else {
                    self.queue.push(ev.number, entry);
                    debug!(repo = %self.entity, pr = %ev.number, "merge queue entry appended");
                }
            }
        }
    }

    /// Pops the next candidate. Rebase-test-merge of the dequeued entry is
    /// not implemented; the entry is tracked in-flight and logged.
    fn drain_next(&mut self) {
        if let Some(entry) = self.queue.pop() {
            info!(
                repo = %self.entity,
                pr = %entry.number,
                branch = %entry.branch,
                in_flight = self.in_flight.len(),
                queued = self.queue.len(),
                "merge train dequeued candidate"
            );
            self.in_flight.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrgId, RepoId};
    use std::time::Duration;

    fn entity() -> RepoEntity {
        RepoEntity::new("acme", "r-1", "api-server", "main")
    }

    fn event(number: u64, action: MergeQueueAction, priority: bool) -> MergeQueueEvent {
        MergeQueueEvent {
            event_id: EventId::new(format!("mq-{number}")),
            org: OrgId::new("acme"),
            repo: RepoId::new("r-1"),
            number: PrNumber(number),
            action,
            branch: format!("pr-{number}"),
            head: Sha::new("c".repeat(40)),
            priority,
        }
    }

    fn queued_numbers(actor: &TrunkActor) -> Vec<u64> {
        actor.queue.all().into_iter().map(|e| e.number.0).collect()
    }

    #[test]
    fn queue_signals_append_prioritize_and_remove() {
        let mut actor = TrunkActor::new(entity(), CoreConfig::new());

        actor.handle_queue(event(1, MergeQueueAction::Queued, false));
        actor.handle_queue(event(2, MergeQueueAction::Queued, false));
        actor.handle_queue(event(3, MergeQueueAction::Queued, true));
        assert_eq!(queued_numbers(&actor), vec![3, 1, 2]);

        actor.handle_queue(event(1, MergeQueueAction::Removed, false));
        assert_eq!(queued_numbers(&actor), vec![3, 2]);

        // Removing an entry that never queued changes nothing.
        actor.handle_queue(event(99, MergeQueueAction::Removed, false));
        assert_eq!(queued_numbers(&actor), vec![3, 2]);
    }

    #[test]
    fn drain_pops_in_train_order_and_tracks_in_flight() {
        let mut actor = TrunkActor::new(entity(), CoreConfig::new());

        actor.handle_queue(event(1, MergeQueueAction::Queued, false));
        actor.handle_queue(event(2, MergeQueueAction::Queued, false));
        actor.handle_queue(event(3, MergeQueueAction::Queued, true));

        actor.drain_next();
        actor.drain_next();
        assert_eq!(
            actor.in_flight.iter().map(|e| e.number.0).collect::<Vec<_>>(),
            vec![3, 1]
        );
        assert_eq!(queued_numbers(&actor), vec![2]);

        actor.drain_next();
        actor.drain_next();
        assert_eq!(actor.in_flight.len(), 3);
        assert!(actor.queue.is_empty());
    }

    #[tokio::test]
    async fn run_loop_drains_queue_and_honors_done() {
        let mut config = CoreConfig::new();
        config.drain_tick = Duration::from_millis(5);
        let actor = TrunkActor::new(entity(), config);

        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(actor.run(rx, cancel));

        tx.send(TrunkSignal::MergeQueue(event(7, MergeQueueAction::Queued, false)))
            .await
            .unwrap();
        tx.send(TrunkSignal::MergeQueue(event(8, MergeQueueAction::Queued, false)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(TrunkSignal::Done).await.unwrap();
        task.await.unwrap();
    }
}
