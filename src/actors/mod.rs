//! Long-lived actors for per-repository event processing.
//!
//! Each repository gets one repo actor, one trunk actor, and one branch actor
//! per tracked branch. Actors are tokio tasks addressed by deterministic
//! string keys and fed through `mpsc` signal channels; at most one signal
//! handler runs at a time within an actor, so actor state needs no locking.
//! All inter-actor communication is by signal, never shared memory.
//!
//! # Signal routing
//!
//! ```text
//!                         ┌──────────────────────────┐
//!                    ┌──► │ branch actor (per branch)│ ──► clone/diff, chat
//!  ┌────────────┐    │    └──────────────────────────┘
//!  │ repo actor │ ───┤
//!  │ (routing)  │    │    ┌──────────────────────────┐
//!  └────────────┘    └──► │ trunk actor (merge train)│ ──► sequencer drain
//!                         └──────────────────────────┘
//! ```
//!
//! The repo actor is the single entry point for inbound events; it records
//! branch triggers, fans out rebase intents when the default branch moves,
//! and forwards merge-queue entries to the trunk.

pub mod branch;
pub mod registry;
pub mod repo;
pub mod trunk;

pub use branch::BranchActor;
pub use registry::{ActorRegistry, SignalError};
pub use repo::RepoActor;
pub use trunk::{MergeQueueEntry, TrunkActor};

use thiserror::Error;
use tokio::sync::oneshot;

use crate::types::{
    EventId, MergeQueueEvent, PullRequestEvent, PushEvent, RebaseEvent, RefEvent,
    ReviewCommentEvent, ReviewEvent,
};

/// Errors answered by actor queries.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No trigger is recorded for the branch.
    #[error("no trigger recorded for branch {0}")]
    TriggerNotFound(String),

    /// The query could not reach the actor or the reply was dropped.
    #[error("query could not be answered: {0}")]
    Unavailable(String),
}

/// Signals consumed by the repo actor.
#[derive(Debug)]
pub enum RepoSignal {
    Push(PushEvent),
    Ref(RefEvent),
    PullRequest(PullRequestEvent),
    Review(ReviewEvent),
    ReviewComment(ReviewCommentEvent),
    MergeQueue(MergeQueueEvent),

    /// Query: the id of the event that created the current trigger for a
    /// branch.
    BranchTrigger {
        branch: String,
        reply: oneshot::Sender<Result<EventId, QueryError>>,
    },
}

/// Signals consumed by a branch actor.
#[derive(Debug)]
pub enum BranchSignal {
    Push(PushEvent),
    Rebase(RebaseEvent),
    Ref(RefEvent),

    /// Explicitly mark the actor done; it exits at the next loop iteration.
    Done,
}

/// Signals consumed by the trunk actor.
#[derive(Debug)]
pub enum TrunkSignal {
    MergeQueue(MergeQueueEvent),

    /// Explicitly mark the actor done; it exits at the next loop iteration.
    Done,
}
