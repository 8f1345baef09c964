//! Expiry reconciler: settles tokens whose key TTL has elapsed.
//!
//! By the time a notification arrives the key and its value are gone, so
//! the decision is made from set membership alone:
//!
//! - still in `assigned` → the lease was abandoned; recreate the key as
//!   available and move the id to `available` (**reclaim**);
//! - otherwise → the token sat unused; drop the id from `available`
//!   (**delete**).
//!
//! Notifications may be duplicated by replays or arrive late, so every
//! mutation is conditioned on what the store says now rather than on the
//! notification itself.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::domain::keys::{ASSIGNED_SET, AVAILABLE_SET, token_id_from_key, token_key};
use crate::domain::{LeaseTimings, TokenId, TokenStatus};
use crate::error::LeaseError;
use crate::store::{ExpiredKey, KeyValueStore, StoreError};

/// What a single reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The key is not a token key.
    Ignored,
    /// The token key exists again; a later operation already settled it.
    Stale(TokenId),
    /// An abandoned lease was returned to the available set.
    Reclaimed(TokenId),
    /// An unused token was removed from the available set.
    Deleted(TokenId),
    /// The token was in neither set; nothing left to do.
    AlreadySettled(TokenId),
}

/// Applies the recycle-or-delete decision to expired token keys.
#[derive(Debug, Clone)]
pub struct ExpiryReconciler {
    store: Arc<dyn KeyValueStore>,
    timings: LeaseTimings,
}

impl ExpiryReconciler {
    /// Creates a reconciler over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, timings: LeaseTimings) -> Self {
        Self { store, timings }
    }

    /// Settles the token behind one expired key.
    ///
    /// Safe to call any number of times for the same key.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::Reconciliation`] if a store call fails. The
    /// token is then left in neither set, which amounts to a deletion.
    pub async fn reconcile(&self, key: &str) -> Result<ReconcileOutcome, LeaseError> {
        let Some(id) = token_id_from_key(key) else {
            return Ok(ReconcileOutcome::Ignored);
        };
        self.settle(id).await.map_err(|source| LeaseError::Reconciliation {
            key: key.to_string(),
            source,
        })
    }

    async fn settle(&self, id: TokenId) -> Result<ReconcileOutcome, StoreError> {
        let key = token_key(&id);
        if self.store.exists(&key).await? {
            return Ok(ReconcileOutcome::Stale(id));
        }

        // Removing from `assigned` is the claim: only one reconciliation of
        // this id can win it, so duplicates fall through to the delete arm.
        if self.store.set_remove(ASSIGNED_SET, id.as_str()).await? {
            self.store
                .set_with_ttl(
                    &key,
                    TokenStatus::Available.as_str(),
                    self.timings.token_expiry,
                )
                .await?;
            self.store.set_add(AVAILABLE_SET, id.as_str()).await?;
            return Ok(ReconcileOutcome::Reclaimed(id));
        }

        if !self.store.set_remove(AVAILABLE_SET, id.as_str()).await? {
            return Ok(ReconcileOutcome::AlreadySettled(id));
        }

        // A free that claimed the id before us may have recreated the key
        // since the existence check; hand its membership back.
        match self.store.get(&key).await? {
            None => Ok(ReconcileOutcome::Deleted(id)),
            Some(status) => {
                if status == TokenStatus::Available.as_str() {
                    self.store.set_add(AVAILABLE_SET, id.as_str()).await?;
                }
                Ok(ReconcileOutcome::Stale(id))
            }
        }
    }

    /// Spawns the listener loop on the current tokio runtime.
    ///
    /// The subscription is taken before this returns, so no expiry that
    /// happens afterwards is missed for lack of a receiver.
    #[must_use]
    pub fn spawn(self) -> ReconcilerHandle {
        let rx = self.store.subscribe_expired();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx, shutdown_rx));
        ReconcilerHandle { shutdown, task }
    }

    async fn run(
        self,
        mut rx: broadcast::Receiver<ExpiredKey>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        tracing::info!("expiry reconciler started");
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                msg = rx.recv() => match msg {
                    Ok(ExpiredKey { key }) => self.handle(&key).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "expiry notifications dropped; tokens left unsettled");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        tracing::info!("expiry reconciler stopped");
    }

    async fn handle(&self, key: &str) {
        match self.reconcile(key).await {
            Ok(ReconcileOutcome::Reclaimed(id)) => {
                tracing::info!(token_id = %id, "abandoned lease reclaimed");
            }
            Ok(ReconcileOutcome::Deleted(id)) => {
                tracing::info!(token_id = %id, "unused token expired");
            }
            Ok(outcome) => tracing::debug!(key, ?outcome, "expiry needed no action"),
            Err(e) => tracing::warn!(key, error = %e, "reconciliation failed"),
        }
    }
}

/// Owned handle to a running reconciler task.
#[derive(Debug)]
pub struct ReconcilerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Signals the listener to stop and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "reconciler task ended abnormally");
        }
    }

    /// Returns `true` once the listener loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
