//! Core domain types for the repository control plane.
//!
//! This module contains the fundamental types used throughout the crate:
//! identifier newtypes, inbound event payloads, and git ref-name helpers.

pub mod events;
pub mod ids;
pub mod refs;

// Re-export commonly used types at the module level
pub use events::{
    ConflictNotification, DiffNotification, EventAction, EventScope, MergeQueueAction,
    MergeQueueEvent, PullRequestEvent, PushEvent, RebaseEvent, RefAction, RefEvent, RefType,
    ReviewCommentEvent, ReviewEvent,
};
pub use ids::{ChatLinkId, EventId, HookKind, InvalidSha, OrgId, PrNumber, RepoEntity, RepoId, Sha};
pub use refs::{branch_name_from_ref, branch_name_to_ref};
