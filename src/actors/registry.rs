//! Actor registry: deterministic addressing and signal-with-create.
//!
//! Logical actors are addressed by string keys derived from repository
//! identity, never by in-memory references. Signaling an address creates the
//! actor if it does not exist yet, so duplicate forwards are idempotent at
//! the creation level. Events themselves are NOT deduplicated: an actor must
//! tolerate receiving the same logical event twice.
//!
//! An actor that has exited (a branch actor marked done) leaves a closed
//! channel behind; the next signal to its address removes the stale handle
//! and creates a fresh actor, preserving at-least-once delivery.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::hooks::HookRegistry;
use crate::pulse::PulseSink;
use crate::types::{EventId, RepoEntity};

use super::branch::BranchActor;
use super::repo::RepoActor;
use super::trunk::TrunkActor;
use super::{BranchSignal, QueryError, RepoSignal, TrunkSignal};

/// Errors from signal delivery.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The target actor's channel closed and could not be recreated.
    #[error("signal channel for {address} closed")]
    ChannelClosed { address: String },
}

/// Per-actor handle: the signal channel plus the task running the actor.
struct Handle<S> {
    tx: mpsc::Sender<S>,

    /// Kept so shutdown can drain the task.
    task: JoinHandle<()>,
}

struct Inner {
    config: CoreConfig,
    hooks: Arc<HookRegistry>,
    pulse: Arc<dyn PulseSink>,
    repos: RwLock<HashMap<String, Handle<RepoSignal>>>,
    branches: RwLock<HashMap<String, Handle<BranchSignal>>>,
    trunks: RwLock<HashMap<String, Handle<TrunkSignal>>>,
    shutdown: CancellationToken,
}

/// Registry of live actors, shared by cloning.
#[derive(Clone)]
pub struct ActorRegistry {
    inner: Arc<Inner>,
}

/// Deterministic address of a repository's repo actor.
pub fn repo_address(entity: &RepoEntity) -> String {
    format!("{}/{}", entity.org, entity.id)
}

/// Deterministic address of a branch actor.
pub fn branch_address(entity: &RepoEntity, branch: &str) -> String {
    format!("{}/{}#{}", entity.org, entity.id, branch)
}

/// Deterministic address of a repository's trunk actor.
pub fn trunk_address(entity: &RepoEntity) -> String {
    format!("{}/{}!trunk", entity.org, entity.id)
}

impl ActorRegistry {
    pub fn new(config: CoreConfig, hooks: Arc<HookRegistry>, pulse: Arc<dyn PulseSink>) -> Self {
        info!(
            workspace_base = %config.workspace_base.display(),
            "creating actor registry"
        );
        ActorRegistry {
            inner: Arc::new(Inner {
                config,
                hooks,
                pulse,
                repos: RwLock::new(HashMap::new()),
                branches: RwLock::new(HashMap::new()),
                trunks: RwLock::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Returns the global shutdown token.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Signals a repository's repo actor, creating it on first event.
    pub async fn signal_repo(
        &self,
        entity: &RepoEntity,
        signal: RepoSignal,
    ) -> Result<(), SignalError> {
        let address = repo_address(entity);
        let tx = {
            let repos = self.inner.repos.read().await;
            repos.get(&address).map(|h| h.tx.clone())
        };
        let tx = match tx {
            Some(tx) => tx,
            None => self.spawn_repo(entity, &address).await,
        };

        if let Err(mpsc::error::SendError(signal)) = tx.send(signal).await {
            // Stale handle from an exited actor: recreate and retry once.
            let tx = self.spawn_repo(entity, &address).await;
            tx.send(signal)
                .await
                .map_err(|_| SignalError::ChannelClosed { address })?;
        }
        Ok(())
    }

    /// Signals a branch actor, creating it if absent.
    pub async fn signal_branch(
        &self,
        entity: &RepoEntity,
        branch: &str,
        signal: BranchSignal,
    ) -> Result<(), SignalError> {
        let address = branch_address(entity, branch);
        let tx = {
            let branches = self.inner.branches.read().await;
            branches.get(&address).map(|h| h.tx.clone())
        };
        let tx = match tx {
            Some(tx) => tx,
            None => self.spawn_branch(entity, branch, &address).await,
        };

        if let Err(mpsc::error::SendError(signal)) = tx.send(signal).await {
            let tx = self.spawn_branch(entity, branch, &address).await;
            tx.send(signal)
                .await
                .map_err(|_| SignalError::ChannelClosed { address })?;
        }
        Ok(())
    }

    /// Signals a repository's trunk actor, creating it lazily on the first
    /// merge-queue signal.
    pub async fn signal_trunk(
        &self,
        entity: &RepoEntity,
        signal: TrunkSignal,
    ) -> Result<(), SignalError> {
        let address = trunk_address(entity);
        let tx = {
            let trunks = self.inner.trunks.read().await;
            trunks.get(&address).map(|h| h.tx.clone())
        };
        let tx = match tx {
            Some(tx) => tx,
            None => self.spawn_trunk(entity, &address).await,
        };

        if let Err(mpsc::error::SendError(signal)) = tx.send(signal).await {
            let tx = self.spawn_trunk(entity, &address).await;
            tx.send(signal)
                .await
                .map_err(|_| SignalError::ChannelClosed { address })?;
        }
        Ok(())
    }

    /// Queries the repo actor for the event that created a branch's trigger.
    pub async fn branch_trigger(
        &self,
        entity: &RepoEntity,
        branch: &str,
    ) -> Result<EventId, QueryError> {
        let (reply, rx) = oneshot::channel();
        self.signal_repo(
            entity,
            RepoSignal::BranchTrigger {
                branch: branch.to_string(),
                reply,
            },
        )
        .await
        .map_err(|e| QueryError::Unavailable(e.to_string()))?;

        rx.await
            .map_err(|e| QueryError::Unavailable(e.to_string()))?
    }

    /// Number of currently registered branch actors. Exited actors whose
    /// handles have not been reaped still count.
    pub async fn active_branch_actors(&self) -> usize {
        self.inner.branches.read().await.len()
    }

    /// Cancels every actor and waits for their tasks to finish.
    pub async fn shutdown(&self) {
        info!("shutting down actor registry");
        self.inner.shutdown.cancel();

        let repos = std::mem::take(&mut *self.inner.repos.write().await);
        let branches = std::mem::take(&mut *self.inner.branches.write().await);
        let trunks = std::mem::take(&mut *self.inner.trunks.write().await);

        for (address, handle) in repos {
            drop(handle.tx);
            if let Err(e) = handle.task.await {
                warn!(address = %address, error = %e, "repo actor task failed");
            }
        }
        for (address, handle) in branches {
            drop(handle.tx);
            if let Err(e) = handle.task.await {
                warn!(address = %address, error = %e, "branch actor task failed");
            }
        }
        for (address, handle) in trunks {
            drop(handle.tx);
            if let Err(e) = handle.task.await {
                warn!(address = %address, error = %e, "trunk actor task failed");
            }
        }
    }

    async fn spawn_repo(&self, entity: &RepoEntity, address: &str) -> mpsc::Sender<RepoSignal> {
        let mut repos = self.inner.repos.write().await;
        // Double-check under the write lock: another task may have spawned
        // the actor while we waited, and its channel may still be open.
        if let Some(handle) = repos.get(address)
            && !handle.tx.is_closed()
        {
            return handle.tx.clone();
        }

        debug!(address = %address, "creating repo actor");
        let (tx, rx) = mpsc::channel(self.inner.config.signal_buffer);
        let actor = RepoActor::new(
            entity.clone(),
            self.clone(),
            self.inner.pulse.clone(),
            self.inner.config.clone(),
        );
        let task = tokio::spawn(actor.run(rx, self.inner.shutdown.child_token()));
        repos.insert(
            address.to_string(),
            Handle {
                tx: tx.clone(),
                task,
            },
        );
        tx
    }

    async fn spawn_branch(
        &self,
        entity: &RepoEntity,
        branch: &str,
        address: &str,
    ) -> mpsc::Sender<BranchSignal> {
        let mut branches = self.inner.branches.write().await;
        if let Some(handle) = branches.get(address)
            && !handle.tx.is_closed()
        {
            return handle.tx.clone();
        }

        debug!(address = %address, "creating branch actor");
        let (tx, rx) = mpsc::channel(self.inner.config.signal_buffer);
        let actor = BranchActor::new(
            entity.clone(),
            branch.to_string(),
            self.inner.hooks.clone(),
            self.inner.config.clone(),
        );
        let task = tokio::spawn(actor.run(rx, self.inner.shutdown.child_token()));
        branches.insert(
            address.to_string(),
            Handle {
                tx: tx.clone(),
                task,
            },
        );
        tx
    }

    async fn spawn_trunk(&self, entity: &RepoEntity, address: &str) -> mpsc::Sender<TrunkSignal> {
        let mut trunks = self.inner.trunks.write().await;
        if let Some(handle) = trunks.get(address)
            && !handle.tx.is_closed()
        {
            return handle.tx.clone();
        }

        debug!(address = %address, "creating trunk actor");
        let (tx, rx) = mpsc::channel(self.inner.config.signal_buffer);
        let actor = TrunkActor::new(entity.clone(), self.inner.config.clone());
        let task = tokio::spawn(actor.run(rx, self.inner.shutdown.child_token()));
        trunks.insert(
            address.to_string(),
            Handle {
                tx: tx.clone(),
                task,
            },
        );
        tx
    }
}
