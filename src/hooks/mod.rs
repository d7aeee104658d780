//! Provider hook interfaces and their registry.
//!
//! Actors reach source-control and chat backends only through these narrow
//! traits. Implementations are registered once at process start in a
//! `HookRegistry` that is passed by reference into the actors; there is no
//! package-level mutable state.
//!
//! A repository whose hook kind has no registered implementation is a
//! configuration error. `HookRegistry::validate` surfaces that at startup so
//! the process fails fast instead of discovering the gap mid-event.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::info;

use crate::types::{ConflictNotification, DiffNotification, HookKind, RepoEntity};

/// Errors from hook resolution and dispatch.
#[derive(Debug, Error)]
pub enum HookError {
    /// No source-control implementation registered for a kind.
    #[error("no source-control hook registered for kind {0}")]
    MissingSource(HookKind),

    /// No chat implementation registered for a kind.
    #[error("no chat notifier registered for kind {0}")]
    MissingChat(HookKind),

    /// The backend rejected or failed the call.
    #[error("hook call failed: {0}")]
    Backend(String),
}

/// Result type for hook operations.
pub type HookResult<T> = Result<T, HookError>;

/// Source-control provider operations.
pub trait SourceControlHook: Send + Sync {
    /// Returns an authenticated clone URL for the repository.
    ///
    /// The URL embeds a token; callers must not log it.
    fn tokenized_clone_url(&self, repo: &RepoEntity) -> HookResult<String>;
}

/// Chat backend operations.
pub trait ChatNotifier: Send + Sync {
    /// Dispatches a "changed lines exceeded the threshold" notification.
    fn notify_lines_exceed(&self, event: &DiffNotification) -> HookResult<()>;

    /// Dispatches a "rebase hit conflicts" notification.
    fn notify_merge_conflict(&self, event: &ConflictNotification) -> HookResult<()>;
}

/// Registry of hook implementations, keyed by provider kind.
#[derive(Default)]
pub struct HookRegistry {
    sources: HashMap<HookKind, Arc<dyn SourceControlHook>>,
    chats: HashMap<HookKind, Arc<dyn ChatNotifier>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_source(mut self, kind: HookKind, hook: Arc<dyn SourceControlHook>) -> Self {
        self.sources.insert(kind, hook);
        self
    }

    pub fn register_chat(mut self, kind: HookKind, notifier: Arc<dyn ChatNotifier>) -> Self {
        self.chats.insert(kind, notifier);
        self
    }

    /// Resolves the source-control hook for a kind.
    pub fn source(&self, kind: HookKind) -> HookResult<Arc<dyn SourceControlHook>> {
        self.sources
            .get(&kind)
            .cloned()
            .ok_or(HookError::MissingSource(kind))
    }

    /// Resolves the chat notifier for a kind.
    pub fn chat(&self, kind: HookKind) -> HookResult<Arc<dyn ChatNotifier>> {
        self.chats
            .get(&kind)
            .cloned()
            .ok_or(HookError::MissingChat(kind))
    }

    /// Fail-fast configuration check: every kind the deployment serves must
    /// have both a source hook and a chat notifier registered.
    pub fn validate(&self, kinds: &[HookKind]) -> HookResult<()> {
        for &kind in kinds {
            self.source(kind)?;
            self.chat(kind)?;
        }
        Ok(())
    }
}

/// Chat notifier that logs instead of dispatching. Used for dry-run mode and
/// as a default when no chat backend is configured.
#[derive(Debug, Default)]
pub struct LoggingChatNotifier;

impl ChatNotifier for LoggingChatNotifier {
    fn notify_lines_exceed(&self, event: &DiffNotification) -> HookResult<()> {
        info!(
            org = %event.org,
            repo = %event.repo_name,
            branch = %event.branch,
            lines = event.total_lines(),
            threshold = event.threshold,
            "diff notification (logging notifier)"
        );
        Ok(())
    }

    fn notify_merge_conflict(&self, event: &ConflictNotification) -> HookResult<()> {
        info!(
            org = %event.org,
            repo = %event.repo_name,
            branch = %event.branch,
            files = event.files.len(),
            "conflict notification (logging notifier)"
        );
        Ok(())
    }
}

/// Source hook that serves a fixed clone URL. Useful for local providers and
/// tests where the "token" is just a filesystem path.
#[derive(Debug)]
pub struct StaticCloneUrl(pub String);

impl SourceControlHook for StaticCloneUrl {
    fn tokenized_clone_url(&self, _repo: &RepoEntity) -> HookResult<String> {
        Ok(self.0.clone())
    }
}

/// Chat notifier that records every dispatched notification. For tests.
#[derive(Debug, Default)]
pub struct RecordingChatNotifier {
    lines: Mutex<Vec<DiffNotification>>,
    conflicts: Mutex<Vec<ConflictNotification>>,
}

impl RecordingChatNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines_exceeded(&self) -> Vec<DiffNotification> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn merge_conflicts(&self) -> Vec<ConflictNotification> {
        self.conflicts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ChatNotifier for RecordingChatNotifier {
    fn notify_lines_exceed(&self, event: &DiffNotification) -> HookResult<()> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }

    fn notify_merge_conflict(&self, event: &ConflictNotification) -> HookResult<()> {
        self.conflicts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}
