//! PostgreSQL implementation of the store capability.
//!
//! Keys live in `lease_keys` with an `expires_at` column and set
//! membership in `lease_set_members`. Reads ignore rows past their
//! deadline. PostgreSQL has no push notification for row expiry, so a
//! sweeper task deletes expired rows with `RETURNING key` and publishes
//! each returned key on the [`ExpiryFeed`]. A row is deleted by exactly
//! one sweeping instance, which keeps delivery at-most-once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;

use super::retry::{with_backoff, with_claim_backoff};
use super::{BackoffPolicy, ExpiredKey, ExpiryFeed, KeyValueStore, StoreError, StoreResult};
use crate::config::LeaseConfig;

/// PostgreSQL-backed store using `sqlx::PgPool`.
///
/// Every statement runs under the configured [`BackoffPolicy`]. Claims
/// (set removal, pop, the expiry sweep) are retried only when the attempt
/// never reached the server, since a repeated claim would observe the
/// state the first one already changed.
#[derive(Debug)]
pub struct PostgresStore {
    pool: PgPool,
    policy: BackoffPolicy,
    feed: ExpiryFeed,
    shutdown: watch::Sender<bool>,
}

impl PostgresStore {
    /// Connects, applies migrations, and spawns the expiry sweeper.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the pool cannot connect or the schema
    /// migration fails.
    pub async fn connect(config: &LeaseConfig) -> StoreResult<Arc<Self>> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;

        Ok(Self::with_pool(
            pool,
            config.store_retry,
            Duration::from_millis(config.expiry_sweep_interval_ms),
            config.expiry_feed_capacity,
        ))
    }

    /// Wraps an existing pool and spawns the expiry sweeper.
    ///
    /// The schema must already exist.
    #[must_use]
    pub fn with_pool(
        pool: PgPool,
        policy: BackoffPolicy,
        sweep_interval: Duration,
        feed_capacity: usize,
    ) -> Arc<Self> {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let store = Arc::new(Self {
            pool,
            policy,
            feed: ExpiryFeed::new(feed_capacity),
            shutdown,
        });
        tokio::spawn(run_sweeper(
            store.pool.clone(),
            policy,
            store.feed.clone(),
            sweep_interval.max(Duration::from_millis(1)),
            shutdown_rx,
        ));
        store
    }
}

/// Deletes expired rows and returns their keys.
async fn sweep_expired(pool: &PgPool) -> StoreResult<Vec<String>> {
    let keys = sqlx::query_scalar::<_, String>(
        "DELETE FROM lease_keys WHERE expires_at <= now() RETURNING key",
    )
    .fetch_all(pool)
    .await?;
    Ok(keys)
}

async fn run_sweeper(
    pool: PgPool,
    policy: BackoffPolicy,
    feed: ExpiryFeed,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => {
                match with_claim_backoff(policy, "sweep", || sweep_expired(&pool)).await {
                    Ok(keys) => {
                        if !keys.is_empty() {
                            tracing::debug!(removed = keys.len(), "swept expired keys");
                        }
                        for key in keys {
                            feed.publish(key);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "expiry sweep failed"),
                }
            }
        }
    }

    tracing::debug!("postgres expiry sweeper stopped");
}

/// Converts a TTL to whole milliseconds for SQL interval arithmetic.
fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

#[async_trait]
impl KeyValueStore for PostgresStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let ms = ttl_millis(ttl);
        with_backoff(self.policy, "set_with_ttl", || async move {
            sqlx::query(
                "INSERT INTO lease_keys (key, value, expires_at) \
                 VALUES ($1, $2, now() + $3::float8 * interval '1 millisecond') \
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
            )
            .bind(key)
            .bind(value)
            .bind(ms)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        with_backoff(self.policy, "get", || async move {
            sqlx::query_scalar::<_, String>(
                "SELECT value FROM lease_keys WHERE key = $1 AND expires_at > now()",
            )
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        with_backoff(self.policy, "exists", || async move {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM lease_keys WHERE key = $1 AND expires_at > now())",
            )
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        with_backoff(self.policy, "delete", || async move {
            sqlx::query_scalar::<_, bool>(
                "DELETE FROM lease_keys WHERE key = $1 RETURNING expires_at > now()",
            )
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map(|was_live| was_live.unwrap_or(false))
            .map_err(StoreError::from)
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let ms = ttl_millis(ttl);
        with_backoff(self.policy, "expire", || async move {
            sqlx::query(
                "UPDATE lease_keys SET expires_at = now() + $2::float8 * interval '1 millisecond' \
                 WHERE key = $1 AND expires_at > now()",
            )
            .bind(key)
            .bind(ms)
            .execute(&self.pool)
            .await
            .map(|result| result.rows_affected() > 0)
            .map_err(StoreError::from)
        })
        .await
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        with_backoff(self.policy, "ttl", || async move {
            sqlx::query_scalar::<_, i64>(
                "SELECT (EXTRACT(EPOCH FROM (expires_at - now())) * 1000)::BIGINT \
                 FROM lease_keys WHERE key = $1 AND expires_at > now()",
            )
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map(|remaining_ms| {
                remaining_ms.map(|ms| Duration::from_millis(u64::try_from(ms).unwrap_or(0)))
            })
            .map_err(StoreError::from)
        })
        .await
    }

    async fn set_add(&self, set: &str, member: &str) -> StoreResult<bool> {
        with_backoff(self.policy, "set_add", || async move {
            sqlx::query(
                "INSERT INTO lease_set_members (set_name, member) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(set)
            .bind(member)
            .execute(&self.pool)
            .await
            .map(|result| result.rows_affected() > 0)
            .map_err(StoreError::from)
        })
        .await
    }

    async fn set_remove(&self, set: &str, member: &str) -> StoreResult<bool> {
        with_claim_backoff(self.policy, "set_remove", || async move {
            sqlx::query("DELETE FROM lease_set_members WHERE set_name = $1 AND member = $2")
                .bind(set)
                .bind(member)
                .execute(&self.pool)
                .await
                .map(|result| result.rows_affected() > 0)
                .map_err(StoreError::from)
        })
        .await
    }

    async fn set_pop(&self, set: &str) -> StoreResult<Option<String>> {
        with_claim_backoff(self.policy, "set_pop", || async move {
            sqlx::query_scalar::<_, String>(
                "DELETE FROM lease_set_members WHERE (set_name, member) IN ( \
                     SELECT set_name, member FROM lease_set_members \
                     WHERE set_name = $1 LIMIT 1 FOR UPDATE SKIP LOCKED \
                 ) RETURNING member",
            )
            .bind(set)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await
    }

    async fn set_is_member(&self, set: &str, member: &str) -> StoreResult<bool> {
        with_backoff(self.policy, "set_is_member", || async move {
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM lease_set_members WHERE set_name = $1 AND member = $2)",
            )
            .bind(set)
            .bind(member)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await
    }

    async fn set_members(&self, set: &str) -> StoreResult<Vec<String>> {
        with_backoff(self.policy, "set_members", || async move {
            sqlx::query_scalar::<_, String>(
                "SELECT member FROM lease_set_members WHERE set_name = $1",
            )
            .bind(set)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await
    }

    fn subscribe_expired(&self) -> broadcast::Receiver<ExpiredKey> {
        self.feed.subscribe()
    }

    async fn ping(&self) -> StoreResult<()> {
        with_backoff(self.policy, "ping", || async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map(|_| ())
                .map_err(StoreError::from)
        })
        .await
    }

    async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_millis_saturates() {
        assert_eq!(ttl_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(ttl_millis(Duration::MAX), i64::MAX);
    }
}
