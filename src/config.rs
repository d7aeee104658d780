//! Runtime configuration for the control plane.
//!
//! Values are tunables, not contracts: deployments adjust them via
//! `REPO_CONDUCTOR_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Default session-creation window (seconds).
const DEFAULT_SESSION_CREATE_SECS: u64 = 30;

/// Default session-execution window (minutes).
const DEFAULT_SESSION_EXEC_MINS: u64 = 30;

/// Default stale-branch monitor interval (hours).
const DEFAULT_STALE_HOURS: u64 = 24;

/// Default pull-request reminder interval (hours).
const DEFAULT_REMINDER_HOURS: u64 = 8;

/// Default merge-train drain pacing (seconds).
const DEFAULT_DRAIN_TICK_SECS: u64 = 1;

/// Default number of processed signals before an actor compacts its history.
const DEFAULT_HISTORY_LIMIT: u64 = 1000;

/// Default per-actor signal channel capacity.
const DEFAULT_SIGNAL_BUFFER: usize = 100;

/// Configuration shared by the actor registry and its actors.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Base directory for temporary clone workspaces.
    pub workspace_base: PathBuf,

    /// Directory for the pulse event record.
    pub pulse_dir: PathBuf,

    /// How long session creation may take before the attempt is abandoned.
    pub session_create_window: Duration,

    /// How long the work inside one session may run.
    pub session_exec_window: Duration,

    /// Branch staleness monitor interval.
    pub stale_interval: Duration,

    /// Pull-request reminder monitor interval.
    pub reminder_interval: Duration,

    /// Pacing between merge-train drain steps.
    pub drain_tick: Duration,

    /// Processed-signal count after which an actor compacts its history.
    pub history_limit: u64,

    /// Capacity of each actor's signal channel.
    pub signal_buffer: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        let base = std::env::temp_dir().join("repo-conductor");
        CoreConfig {
            workspace_base: base.join("workspaces"),
            pulse_dir: base.join("pulse"),
            session_create_window: Duration::from_secs(DEFAULT_SESSION_CREATE_SECS),
            session_exec_window: Duration::from_secs(DEFAULT_SESSION_EXEC_MINS * 60),
            stale_interval: Duration::from_secs(DEFAULT_STALE_HOURS * 3600),
            reminder_interval: Duration::from_secs(DEFAULT_REMINDER_HOURS * 3600),
            drain_tick: Duration::from_secs(DEFAULT_DRAIN_TICK_SECS),
            history_limit: DEFAULT_HISTORY_LIMIT,
            signal_buffer: DEFAULT_SIGNAL_BUFFER,
        }
    }

    /// Creates a configuration from `REPO_CONDUCTOR_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Some(dir) = std::env::var_os("REPO_CONDUCTOR_WORKSPACE_DIR") {
            config.workspace_base = PathBuf::from(dir);
        }
        if let Some(dir) = std::env::var_os("REPO_CONDUCTOR_PULSE_DIR") {
            config.pulse_dir = PathBuf::from(dir);
        }
        if let Some(secs) = env_u64("REPO_CONDUCTOR_SESSION_CREATE_SECS") {
            config.session_create_window = Duration::from_secs(secs);
        }
        if let Some(mins) = env_u64("REPO_CONDUCTOR_SESSION_EXEC_MINS") {
            config.session_exec_window = Duration::from_secs(mins * 60);
        }
        if let Some(hours) = env_u64("REPO_CONDUCTOR_STALE_HOURS") {
            config.stale_interval = Duration::from_secs(hours * 3600);
        }
        if let Some(hours) = env_u64("REPO_CONDUCTOR_REMINDER_HOURS") {
            config.reminder_interval = Duration::from_secs(hours * 3600);
        }
        if let Some(limit) = env_u64("REPO_CONDUCTOR_HISTORY_LIMIT") {
            config.history_limit = limit.max(1);
        }

        config
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_windows() {
        let config = CoreConfig::new();
        assert_eq!(config.session_create_window, Duration::from_secs(30));
        assert_eq!(config.session_exec_window, Duration::from_secs(30 * 60));
        assert!(config.history_limit > 0);
        assert!(config.signal_buffer > 0);
    }
}
