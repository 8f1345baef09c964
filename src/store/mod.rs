//! Key-value store capability consumed by the lease pool.
//!
//! The pool is written against [`KeyValueStore`]: per-key values with a
//! TTL, atomic set membership primitives, and a feed of expired keys.
//! Two backends are provided, an in-process [`InMemoryStore`] and a
//! PostgreSQL-backed [`PostgresStore`]. [`connect`] picks one from the
//! configuration.

pub mod error;
pub mod expiry_feed;
pub mod memory;
pub mod postgres;
pub mod retry;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

pub use error::StoreError;
pub use expiry_feed::{ExpiredKey, ExpiryFeed};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use retry::BackoffPolicy;

use crate::config::{LeaseConfig, StoreBackend};

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store primitives the lease pool is built from.
///
/// Every method is a single atomic step. Sequences of calls are not.
/// Methods returning `bool` report whether they changed anything, so
/// callers can condition follow-up steps on the outcome.
#[async_trait]
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Sets `key` to `value`, replacing any previous value and TTL.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Returns the value of a live key.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Returns `true` if `key` exists and has not expired.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Deletes `key`. Returns `true` if a live key was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Resets the TTL of a live key. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Remaining time-to-live of a live key.
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Adds `member` to `set`. Returns `true` if it was not already present.
    async fn set_add(&self, set: &str, member: &str) -> StoreResult<bool>;

    /// Removes `member` from `set`. Returns `true` if it was present.
    async fn set_remove(&self, set: &str, member: &str) -> StoreResult<bool>;

    /// Removes and returns an arbitrary member of `set`.
    async fn set_pop(&self, set: &str) -> StoreResult<Option<String>>;

    /// Returns `true` if `member` belongs to `set`.
    async fn set_is_member(&self, set: &str, member: &str) -> StoreResult<bool>;

    /// Returns all members of `set`, in no particular order.
    async fn set_members(&self, set: &str) -> StoreResult<Vec<String>>;

    /// Subscribes to expired-key notifications.
    fn subscribe_expired(&self) -> broadcast::Receiver<ExpiredKey>;

    /// Round-trips to the backend.
    async fn ping(&self) -> StoreResult<()>;

    /// Stops background expiry work and releases connections.
    async fn shutdown(&self);
}

/// Builds the backend selected by `config` and starts its expiry sweeper.
///
/// # Errors
///
/// Returns [`StoreError`] if the PostgreSQL backend cannot connect or
/// migrate its schema.
pub async fn connect(config: &LeaseConfig) -> StoreResult<Arc<dyn KeyValueStore>> {
    let sweep_interval = Duration::from_millis(config.expiry_sweep_interval_ms);
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory store");
            let store: Arc<dyn KeyValueStore> =
                InMemoryStore::start(sweep_interval, config.expiry_feed_capacity);
            Ok(store)
        }
        StoreBackend::Postgres => {
            tracing::info!(
                max_connections = config.database_max_connections,
                "connecting to postgres store"
            );
            let store: Arc<dyn KeyValueStore> = PostgresStore::connect(config).await?;
            Ok(store)
        }
    }
}
