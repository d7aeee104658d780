//! Scoped execution sessions for external git work.
//!
//! A session pins one clone/diff/cleanup sequence to a single workspace
//! directory for its whole lifetime, and bounds both how long the session may
//! take to come up and how long the work inside it may run. Handlers never
//! block past the configured windows: a session that cannot be created or
//! whose work overruns returns an error the actor logs and moves past.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

use crate::config::CoreConfig;

/// Errors from session setup and execution.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session could not be created within the creation window.
    #[error("session creation timed out after {0:?}")]
    CreateTimedOut(Duration),

    /// The work did not finish within the execution window.
    #[error("session execution window of {0:?} exhausted")]
    ExecTimedOut(Duration),

    /// Workspace setup failed.
    #[error("workspace setup failed: {0}")]
    Setup(#[from] std::io::Error),

    /// The blocking task died before producing a result.
    #[error("session task failed: {0}")]
    Task(String),
}

/// A bounded execution context owning one workspace directory.
pub struct ScopedSession {
    workspace: PathBuf,
    opened_at: Instant,
    exec_window: Duration,
}

impl ScopedSession {
    /// Opens a session for the workspace `id` under the configured base.
    ///
    /// Creation is bounded by the configured creation window.
    pub async fn open(id: &str, config: &CoreConfig) -> Result<Self, SessionError> {
        let workspace = config.workspace_base.join(id);
        let base = config.workspace_base.clone();

        let create = tokio::task::spawn_blocking(move || std::fs::create_dir_all(&base));
        let created = tokio::time::timeout(config.session_create_window, create)
            .await
            .map_err(|_| SessionError::CreateTimedOut(config.session_create_window))?
            .map_err(|e| SessionError::Task(e.to_string()))?;
        created?;

        Ok(ScopedSession {
            workspace,
            opened_at: Instant::now(),
            exec_window: config.session_exec_window,
        })
    }

    /// The workspace directory this session is pinned to.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Time left in the execution window.
    pub fn remaining(&self) -> Duration {
        self.exec_window.saturating_sub(self.opened_at.elapsed())
    }

    /// Runs blocking work on the session's workspace, bounded by what remains
    /// of the execution window.
    pub async fn execute<T, F>(&self, work: F) -> Result<T, SessionError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return Err(SessionError::ExecTimedOut(self.exec_window));
        }
        tokio::time::timeout(remaining, tokio::task::spawn_blocking(work))
            .await
            .map_err(|_| SessionError::ExecTimedOut(self.exec_window))?
            .map_err(|e| SessionError::Task(e.to_string()))
    }

    /// Closes the session, removing the workspace directory best-effort.
    pub fn close(self) {
        if let Err(e) = crate::gitcmp::remove_workspace(&self.workspace) {
            warn!(
                workspace = %self.workspace.display(),
                error = %e,
                "workspace cleanup failed"
            );
        }
    }
}
