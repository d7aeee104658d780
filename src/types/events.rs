//! Inbound source-control event payloads.
//!
//! These are the typed signals the actors exchange. The ingestion layer maps
//! provider webhooks onto these payloads before handing them to the registry;
//! actors never see raw provider JSON.

use serde::{Deserialize, Serialize};

use super::ids::{ChatLinkId, EventId, HookKind, OrgId, PrNumber, RepoId, Sha};

/// The scope of a generated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventScope {
    Push,
    Ref,
    PullRequest,
    Review,
    ReviewComment,
    Rebase,
    MergeQueue,
}

/// The action carried by a generated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Requested,
    Created,
    Deleted,
}

/// A push to a ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// Ingestion-assigned event id.
    pub event_id: EventId,

    pub org: OrgId,
    pub repo: RepoId,

    /// The pushed ref (e.g., "refs/heads/feature-a").
    pub ref_name: String,

    /// The commit the ref points at after the push.
    pub head: Sha,
}

/// The kind of ref a ref event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefType {
    Branch,
    Tag,
}

/// What happened to the ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefAction {
    Created,
    Deleted,
}

/// A ref was created or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefEvent {
    pub event_id: EventId,
    pub org: OrgId,
    pub repo: RepoId,

    /// The full ref name (e.g., "refs/heads/feature-a").
    pub ref_name: String,

    pub ref_type: RefType,
    pub action: RefAction,
}

/// Pull request activity.
///
/// Currently consumed without action by the repo actor; kept as a typed
/// payload so future trigger logic has the fields it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub event_id: EventId,
    pub org: OrgId,
    pub repo: RepoId,
    pub number: PrNumber,
    pub action: String,
    pub head: Sha,
}

/// A pull request review was submitted or dismissed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub event_id: EventId,
    pub org: OrgId,
    pub repo: RepoId,
    pub number: PrNumber,
    pub action: String,
}

/// A review comment was created, edited, or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewCommentEvent {
    pub event_id: EventId,
    pub org: OrgId,
    pub repo: RepoId,
    pub number: PrNumber,
    pub action: String,
}

/// What happened to a merge queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeQueueAction {
    /// The entry was added to the queue.
    Queued,
    /// The entry was removed from the queue.
    Removed,
}

/// A merge queue entry changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeQueueEvent {
    pub event_id: EventId,
    pub org: OrgId,
    pub repo: RepoId,

    /// The pull request this entry is for. Keys the merge train.
    pub number: PrNumber,

    pub action: MergeQueueAction,

    /// The head branch of the pull request.
    pub branch: String,

    /// The head commit of the pull request.
    pub head: Sha,

    /// High-priority entries jump to the head of the train.
    pub priority: bool,
}

/// A rebase intent, generated by the repo actor when the default branch moves.
///
/// One intent is produced per triggered branch; `base` names the branch to
/// rebase and `head` is the new default-branch commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseEvent {
    /// Derived deterministically from the originating push event id.
    pub event_id: EventId,

    pub org: OrgId,
    pub repo: RepoId,

    pub scope: EventScope,
    pub action: EventAction,

    /// The triggered branch to be rebased.
    pub base: String,

    /// The commit the default branch was pushed to.
    pub head: Sha,

    /// The event that created the branch trigger, if still known.
    pub parent: Option<EventId>,
}

impl RebaseEvent {
    /// Builds a rebase intent for one triggered branch from a default-branch push.
    pub fn from_push(push: &PushEvent, branch: &str, parent: Option<EventId>) -> Self {
        RebaseEvent {
            event_id: push.event_id.derive_rebase(branch),
            org: push.org.clone(),
            repo: push.repo.clone(),
            scope: EventScope::Rebase,
            action: EventAction::Requested,
            base: branch.to_string(),
            head: push.head.clone(),
            parent,
        }
    }
}

/// Notification payload for a diff whose changed-line total exceeded the
/// repository threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffNotification {
    pub org: OrgId,
    pub repo: RepoId,
    pub repo_name: String,
    pub branch: String,
    pub hook_kind: HookKind,
    pub chat_link: Option<ChatLinkId>,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub threshold: u64,
    pub head: Sha,
}

impl DiffNotification {
    /// Total changed lines this notification reports.
    pub fn total_lines(&self) -> u64 {
        self.lines_added + self.lines_removed
    }
}

/// Notification payload for a rebase that hit conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictNotification {
    pub org: OrgId,
    pub repo: RepoId,
    pub repo_name: String,
    pub branch: String,
    pub hook_kind: HookKind,
    pub chat_link: Option<ChatLinkId>,

    /// The commit the rebase was attempted onto.
    pub base: Sha,

    /// Paths left unmerged by the attempt.
    pub files: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(id: &str, reference: &str, head: &str) -> PushEvent {
        PushEvent {
            event_id: EventId::new(id),
            org: OrgId::new("acme"),
            repo: RepoId::new("r-1"),
            ref_name: reference.to_string(),
            head: Sha::new(head),
        }
    }

    #[test]
    fn rebase_intent_carries_trigger_branch_and_pushed_head() {
        let ev = push("d-1", "refs/heads/main", &"a".repeat(40));
        let intent = RebaseEvent::from_push(&ev, "feature-a", Some(EventId::new("d-0")));

        assert_eq!(intent.scope, EventScope::Rebase);
        assert_eq!(intent.action, EventAction::Requested);
        assert_eq!(intent.base, "feature-a");
        assert_eq!(intent.head, ev.head);
        assert_eq!(intent.parent, Some(EventId::new("d-0")));
        assert_eq!(intent.event_id, ev.event_id.derive_rebase("feature-a"));
    }

    #[test]
    fn merge_queue_event_serde_roundtrip() {
        let ev = MergeQueueEvent {
            event_id: EventId::new("d-9"),
            org: OrgId::new("acme"),
            repo: RepoId::new("r-1"),
            number: PrNumber(17),
            action: MergeQueueAction::Queued,
            branch: "feature-a".to_string(),
            head: Sha::new("b".repeat(40)),
            priority: true,
        };
        let json = serde_json::to_string(&ev).unwrap();
        let parsed: MergeQueueEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev, parsed);
        assert!(json.contains("\"queued\""));
    }
}
