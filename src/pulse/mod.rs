//! Best-effort durable record of generated events ("pulse").
//!
//! Rebase intents produced by fan-out are persisted here before being
//! forwarded, keyed by organization. The record is an audit trail, not a
//! source of truth: persistence failures are logged by callers and never stop
//! event processing.
//!
//! The on-disk format is JSON Lines, one timestamped record per line, so a
//! partial line from a crash mid-write never corrupts earlier records.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RebaseEvent;

/// Errors from pulse persistence.
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A sink for generated events.
pub trait PulseSink: Send + Sync {
    /// Records one event. Best effort; the caller logs failures and proceeds.
    fn persist(&self, event: &RebaseEvent) -> Result<(), PulseError>;
}

/// One persisted line.
#[derive(Debug, Serialize, Deserialize)]
pub struct PulseRecord {
    /// When the record was written (UTC).
    pub ts: DateTime<Utc>,

    #[serde(flatten)]
    pub event: RebaseEvent,
}

/// JSON-Lines pulse sink, one file per organization.
#[derive(Debug)]
pub struct JsonlPulse {
    base_dir: PathBuf,
}

impl JsonlPulse {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        JsonlPulse {
            base_dir: base_dir.into(),
        }
    }

    fn org_file(&self, org: &str) -> PathBuf {
        self.base_dir.join(format!("{org}.pulse.jsonl"))
    }
}

impl PulseSink for JsonlPulse {
    fn persist(&self, event: &RebaseEvent) -> Result<(), PulseError> {
        std::fs::create_dir_all(&self.base_dir)?;

        let record = PulseRecord {
            ts: Utc::now(),
            event: event.clone(),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.org_file(event.org.as_str()))?;
        file.write_all(&line)?;
        Ok(())
    }
}

/// Sink that drops everything. For tests and deployments without an audit
/// trail.
#[derive(Debug, Default)]
pub struct NullPulse;

impl PulseSink for NullPulse {
    fn persist(&self, _event: &RebaseEvent) -> Result<(), PulseError> {
        Ok(())
    }
}

/// Sink that keeps records in memory. For tests.
#[derive(Debug, Default)]
pub struct RecordingPulse {
    events: std::sync::Mutex<Vec<RebaseEvent>>,
}

impl RecordingPulse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RebaseEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl PulseSink for RecordingPulse {
    fn persist(&self, event: &RebaseEvent) -> Result<(), PulseError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventId, OrgId, PushEvent, RebaseEvent, RepoId, Sha};
    use tempfile::TempDir;

    fn intent(org: &str, branch: &str) -> RebaseEvent {
        let push = PushEvent {
            event_id: EventId::new("d-1"),
            org: OrgId::new(org),
            repo: RepoId::new("r-1"),
            ref_name: "refs/heads/main".to_string(),
            head: Sha::new("a".repeat(40)),
        };
        RebaseEvent::from_push(&push, branch, None)
    }

    #[test]
    fn jsonl_sink_appends_one_line_per_event_keyed_by_org() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlPulse::new(dir.path());

        sink.persist(&intent("acme", "feature-a")).unwrap();
        sink.persist(&intent("acme", "feature-b")).unwrap();
        sink.persist(&intent("umbrella", "feature-a")).unwrap();

        let acme = std::fs::read_to_string(dir.path().join("acme.pulse.jsonl")).unwrap();
        assert_eq!(acme.lines().count(), 2);

        let record: PulseRecord = serde_json::from_str(acme.lines().next().unwrap()).unwrap();
        assert_eq!(record.event.base, "feature-a");

        let umbrella = std::fs::read_to_string(dir.path().join("umbrella.pulse.jsonl")).unwrap();
        assert_eq!(umbrella.lines().count(), 1);
    }
}
