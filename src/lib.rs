//! Repo Conductor - a per-repository control plane for source-control events.
//!
//! This library turns raw source-control events (pushes, ref changes,
//! pull-request activity, merge-queue entries) into durable, ordered actions:
//! diff-threshold notification, rebase orchestration, and merge-train
//! sequencing. Decisions are serialized per branch and per trunk by
//! long-lived actors that survive restarts and long idle periods.

pub mod actors;
pub mod config;
pub mod gitcmp;
pub mod hooks;
pub mod pulse;
pub mod sequencer;
pub mod session;
pub mod types;
