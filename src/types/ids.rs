//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different ID types (e.g., using an
//! OrgId where a RepoId is expected) and make the code more self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An organization identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgId(pub String);

impl OrgId {
    pub fn new(s: impl Into<String>) -> Self {
        OrgId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrgId {
    fn from(s: &str) -> Self {
        OrgId(s.to_string())
    }
}

/// A repository identifier (opaque provider-side id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(pub String);

impl RepoId {
    pub fn new(s: impl Into<String>) -> Self {
        RepoId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RepoId {
    fn from(s: &str) -> Self {
        RepoId(s.to_string())
    }
}

/// A pull request number within a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrNumber(pub u64);

impl fmt::Display for PrNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for PrNumber {
    fn from(n: u64) -> Self {
        PrNumber(n)
    }
}

/// Error returned when a string is not a valid commit SHA.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid SHA: {0:?}")]
pub struct InvalidSha(pub String);

/// A git commit SHA (40 hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sha(pub String);

impl Sha {
    /// Creates a new Sha from a string.
    ///
    /// Note: This does not validate the format. Valid SHAs are 40 hex characters.
    pub fn new(s: impl Into<String>) -> Self {
        Sha(s.into())
    }

    /// Parses a SHA, validating that it is 40 lowercase hex characters.
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidSha> {
        let s = s.into();
        if s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Sha(s))
        } else {
            Err(InvalidSha(s))
        }
    }

    /// Returns the SHA as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a short (7-character) version of the SHA for display.
    pub fn short(&self) -> &str {
        // Use get() to avoid panic if string contains non-ASCII (can occur via
        // Sha::new or Deserialize on bad input).
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Sha {
    fn from(s: String) -> Self {
        Sha(s)
    }
}

impl From<&str> for Sha {
    fn from(s: &str) -> Self {
        Sha(s.to_string())
    }
}

/// The identifier of an inbound source-control event.
///
/// Event ids are assigned by the ingestion layer (e.g., a webhook delivery id)
/// and are carried through triggers and derived events so that downstream
/// records can be traced back to the event that caused them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    pub fn new(s: impl Into<String>) -> Self {
        EventId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the id of a rebase intent generated from this event for a
    /// specific branch. The derivation is deterministic so that a replayed
    /// fan-out produces the same ids.
    pub fn derive_rebase(&self, branch: &str) -> EventId {
        EventId(format!("{}/rebase/{}", self.0, branch))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        EventId(s.to_string())
    }
}

/// A reference to a chat destination linked to a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatLinkId(pub String);

impl ChatLinkId {
    pub fn new(s: impl Into<String>) -> Self {
        ChatLinkId(s.into())
    }
}

impl fmt::Display for ChatLinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of provider hook a repository is served by.
///
/// Used to look up source-control and chat implementations in the hook
/// registry. Unknown kinds are a configuration error, caught at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    GitHub,
    GitLab,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::GitHub => "github",
            HookKind::GitLab => "gitlab",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository entity as resolved by the embedding service.
///
/// This is the slice of the stored repository record that the control plane
/// needs: identity, the default branch that drives rebase fan-out, and the
/// changed-line threshold for diff notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntity {
    /// Owning organization.
    pub org: OrgId,

    /// Stable repository id.
    pub id: RepoId,

    /// Human-readable repository name (e.g., "api-server").
    pub name: String,

    /// The default branch name (e.g., "main").
    pub default_branch: String,

    /// Total changed lines above which a diff notification is sent.
    pub line_threshold: u64,

    /// Which provider hook serves this repository.
    pub hook_kind: HookKind,

    /// Linked chat destination, if any.
    pub chat_link: Option<ChatLinkId>,
}

impl RepoEntity {
    pub fn new(
        org: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        default_branch: impl Into<String>,
    ) -> Self {
        RepoEntity {
            org: OrgId::new(org),
            id: RepoId::new(id),
            name: name.into(),
            default_branch: default_branch.into(),
            line_threshold: 500,
            hook_kind: HookKind::GitHub,
            chat_link: None,
        }
    }

    pub fn with_line_threshold(mut self, threshold: u64) -> Self {
        self.line_threshold = threshold;
        self
    }

    pub fn with_chat_link(mut self, link: impl Into<String>) -> Self {
        self.chat_link = Some(ChatLinkId::new(link));
        self
    }
}

impl fmt::Display for RepoEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.name)
    }
}
