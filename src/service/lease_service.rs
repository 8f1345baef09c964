//! Lease pool manager: token creation, assignment, release, renewal.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::keys::{ASSIGNED_SET, AVAILABLE_SET, token_key};
use crate::domain::{AssignedToken, LeaseTimings, PoolStats, TokenId, TokenInfo, TokenStatus};
use crate::error::LeaseError;
use crate::store::KeyValueStore;

/// Largest number of tokens a single `create_tokens` call may add.
pub const MAX_CREATE_BATCH: i64 = 10_000;

/// Orchestration layer for all caller-facing pool operations.
///
/// Stateless coordinator: every method is a short sequence of store
/// primitives and nothing is cached between calls. Sequences are not
/// atomic as a whole; each is ordered so that a sequence cut short leaves
/// the store in a state the reconciler can settle.
#[derive(Debug, Clone)]
pub struct LeaseService {
    store: Arc<dyn KeyValueStore>,
    timings: LeaseTimings,
}

impl LeaseService {
    /// Creates a new `LeaseService`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, timings: LeaseTimings) -> Self {
        Self { store, timings }
    }

    /// Returns a reference to the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Adds `count` fresh tokens to the available set.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::InvalidArgument`] if `count` is not positive
    /// or exceeds [`MAX_CREATE_BATCH`], or [`LeaseError::Store`] if the
    /// store fails part-way (tokens created before the failure remain).
    pub async fn create_tokens(&self, count: i64) -> Result<Vec<TokenId>, LeaseError> {
        if count <= 0 {
            return Err(LeaseError::InvalidArgument(format!(
                "count must be positive, got {count}"
            )));
        }
        if count > MAX_CREATE_BATCH {
            return Err(LeaseError::InvalidArgument(format!(
                "count must be at most {MAX_CREATE_BATCH}, got {count}"
            )));
        }

        let mut created = Vec::new();
        for _ in 0..count {
            let id = TokenId::new();
            self.store
                .set_with_ttl(
                    &token_key(&id),
                    TokenStatus::Available.as_str(),
                    self.timings.token_expiry,
                )
                .await?;
            self.store.set_add(AVAILABLE_SET, id.as_str()).await?;
            created.push(id);
        }

        tracing::info!(count, "tokens created");
        Ok(created)
    }

    /// Leases an arbitrary available token.
    ///
    /// The pop from the available set is atomic, so no two callers can
    /// receive the same id.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::PoolExhausted`] if no token is available, or
    /// [`LeaseError::Store`] on store failure.
    pub async fn assign_token(&self) -> Result<TokenId, LeaseError> {
        let Some(raw) = self.store.set_pop(AVAILABLE_SET).await? else {
            return Err(LeaseError::PoolExhausted);
        };
        let id = TokenId::from(raw);

        self.store
            .set_with_ttl(
                &token_key(&id),
                TokenStatus::Assigned.as_str(),
                self.timings.keep_alive_expiry,
            )
            .await?;
        self.store.set_add(ASSIGNED_SET, id.as_str()).await?;

        tracing::info!(token_id = %id, "token assigned");
        Ok(id)
    }

    /// Returns an assigned token to the available set.
    ///
    /// The token is claimed by removing it from the assigned set first, so
    /// a second concurrent free of the same id fails.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::TokenNotFound`] if `id` is not assigned, or
    /// [`LeaseError::Store`] on store failure.
    pub async fn free_token(&self, id: &TokenId) -> Result<(), LeaseError> {
        if !self.store.set_remove(ASSIGNED_SET, id.as_str()).await? {
            return Err(LeaseError::TokenNotFound(id.clone()));
        }

        self.store
            .set_with_ttl(
                &token_key(id),
                TokenStatus::Available.as_str(),
                self.timings.token_expiry,
            )
            .await?;
        self.store.set_add(AVAILABLE_SET, id.as_str()).await?;

        tracing::info!(token_id = %id, "token freed");
        Ok(())
    }

    /// Permanently removes a token, whichever set it is in.
    ///
    /// Memberships are dropped before the key so an interrupted delete
    /// never leaves a membership pointing at a missing key.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::TokenNotFound`] if the token key does not
    /// exist, or [`LeaseError::Store`] on store failure.
    pub async fn delete_token(&self, id: &TokenId) -> Result<(), LeaseError> {
        let key = token_key(id);
        if !self.store.exists(&key).await? {
            return Err(LeaseError::TokenNotFound(id.clone()));
        }

        self.store.set_remove(AVAILABLE_SET, id.as_str()).await?;
        self.store.set_remove(ASSIGNED_SET, id.as_str()).await?;
        self.store.delete(&key).await?;

        tracing::info!(token_id = %id, "token deleted");
        Ok(())
    }

    /// Refreshes the TTL of a live token without changing its status.
    ///
    /// Assigned tokens get the keep-alive TTL, available ones the idle TTL.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::TokenNotFound`] if the token key does not
    /// exist, or [`LeaseError::Store`] on store failure.
    pub async fn keep_alive(&self, id: &TokenId) -> Result<(), LeaseError> {
        let key = token_key(id);
        if !self.store.exists(&key).await? {
            return Err(LeaseError::TokenNotFound(id.clone()));
        }

        let status = if self.store.set_is_member(ASSIGNED_SET, id.as_str()).await? {
            TokenStatus::Assigned
        } else {
            TokenStatus::Available
        };
        if !self.store.expire(&key, self.timings.ttl_for(status)).await? {
            return Err(LeaseError::TokenNotFound(id.clone()));
        }

        tracing::debug!(token_id = %id, %status, "token kept alive");
        Ok(())
    }

    /// Snapshot of every live token with its status and expiry.
    ///
    /// A token caught in both sets mid-transition is reported once, as
    /// assigned. Members whose key has already expired are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::Store`] on store failure.
    pub async fn list_all(&self) -> Result<Vec<TokenInfo>, LeaseError> {
        let assigned = self.store.set_members(ASSIGNED_SET).await?;
        let available = self.store.set_members(AVAILABLE_SET).await?;
        let assigned_ids: HashSet<&str> = assigned.iter().map(String::as_str).collect();

        let candidates = assigned
            .iter()
            .map(|id| (id, TokenStatus::Assigned))
            .chain(
                available
                    .iter()
                    .filter(|id| !assigned_ids.contains(id.as_str()))
                    .map(|id| (id, TokenStatus::Available)),
            );

        let mut tokens = Vec::with_capacity(assigned.len().saturating_add(available.len()));
        for (raw, status) in candidates {
            let id = TokenId::from(raw.as_str());
            if let Some(expires_at) = self.expires_at(&id).await? {
                tokens.push(TokenInfo {
                    id,
                    status,
                    expires_at,
                });
            }
        }
        tokens.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tokens)
    }

    /// Snapshot of assigned tokens with their lease expiry.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::Store`] on store failure.
    pub async fn list_assigned(&self) -> Result<Vec<AssignedToken>, LeaseError> {
        let members = self.store.set_members(ASSIGNED_SET).await?;

        let mut tokens = Vec::with_capacity(members.len());
        for raw in members {
            let id = TokenId::from(raw);
            if let Some(expires_at) = self.expires_at(&id).await? {
                tokens.push(AssignedToken { id, expires_at });
            }
        }
        tokens.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tokens)
    }

    /// Status and expiry of a single token, read from its key.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::TokenNotFound`] if the key does not exist,
    /// [`LeaseError::Internal`] if the stored status is unreadable, or
    /// [`LeaseError::Store`] on store failure.
    pub async fn get_token(&self, id: &TokenId) -> Result<TokenInfo, LeaseError> {
        let key = token_key(id);
        let Some(raw_status) = self.store.get(&key).await? else {
            return Err(LeaseError::TokenNotFound(id.clone()));
        };
        let status: TokenStatus = raw_status
            .parse()
            .map_err(|e| LeaseError::Internal(format!("token {id}: {e}")))?;
        let Some(expires_at) = self.expires_at(id).await? else {
            return Err(LeaseError::TokenNotFound(id.clone()));
        };
        Ok(TokenInfo {
            id: id.clone(),
            status,
            expires_at,
        })
    }

    /// Current sizes of the available and assigned sets.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::Store`] on store failure.
    pub async fn pool_stats(&self) -> Result<PoolStats, LeaseError> {
        Ok(PoolStats {
            available: self.store.set_members(AVAILABLE_SET).await?.len(),
            assigned: self.store.set_members(ASSIGNED_SET).await?.len(),
        })
    }

    async fn expires_at(&self, id: &TokenId) -> Result<Option<DateTime<Utc>>, LeaseError> {
        let remaining = self.store.ttl(&token_key(id)).await?;
        Ok(remaining.map(absolute_expiry))
    }
}

/// Converts a remaining TTL into a wall-clock instant.
fn absolute_expiry(remaining: Duration) -> DateTime<Utc> {
    let delta = TimeDelta::from_std(remaining).unwrap_or(TimeDelta::MAX);
    Utc::now()
        .checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::store::InMemoryStore;

    const TOKEN_EXPIRY: Duration = Duration::from_secs(600);
    const KEEP_ALIVE_EXPIRY: Duration = Duration::from_secs(30);

    fn make_service() -> LeaseService {
        let store: Arc<dyn KeyValueStore> =
            InMemoryStore::start(Duration::from_millis(100), 1000);
        LeaseService::new(store, LeaseTimings::new(TOKEN_EXPIRY, KEEP_ALIVE_EXPIRY))
    }

    async fn stats(service: &LeaseService) -> PoolStats {
        let Ok(stats) = service.pool_stats().await else {
            panic!("pool stats failed");
        };
        stats
    }

    async fn in_set(service: &LeaseService, set: &str, id: &TokenId) -> bool {
        matches!(service.store().set_is_member(set, id.as_str()).await, Ok(true))
    }

    #[tokio::test]
    async fn create_rejects_non_positive_count() {
        let service = make_service();
        for count in [0, -1] {
            let err = assert_err!(service.create_tokens(count).await);
            assert!(matches!(err, LeaseError::InvalidArgument(_)));
        }
        assert_eq!(stats(&service).await, PoolStats::default());
    }

    #[tokio::test]
    async fn create_rejects_oversized_batch_before_touching_store() {
        let service = make_service();
        for count in [MAX_CREATE_BATCH + 1, i64::MAX] {
            let err = assert_err!(service.create_tokens(count).await);
            assert!(matches!(err, LeaseError::InvalidArgument(_)));
        }
        assert_eq!(stats(&service).await, PoolStats::default());
    }

    #[tokio::test]
    async fn three_tokens_assign_then_exhaust() {
        let service = make_service();
        assert_ok!(service.create_tokens(3).await);
        assert_eq!(
            stats(&service).await,
            PoolStats {
                available: 3,
                assigned: 0
            }
        );

        let mut ids = HashSet::new();
        for _ in 0..3 {
            let id = assert_ok!(service.assign_token().await);
            ids.insert(id);
        }
        assert_eq!(ids.len(), 3);
        assert_eq!(
            stats(&service).await,
            PoolStats {
                available: 0,
                assigned: 3
            }
        );

        let err = assert_err!(service.assign_token().await);
        assert!(matches!(err, LeaseError::PoolExhausted));
    }

    #[tokio::test]
    async fn concurrent_assign_never_hands_out_an_id_twice() {
        let service = make_service();
        assert_ok!(service.create_tokens(20).await);

        let mut handles = Vec::new();
        for _ in 0..30 {
            let service = service.clone();
            handles.push(tokio::spawn(async move { service.assign_token().await }));
        }

        let mut ids = HashSet::new();
        let mut exhausted = 0;
        for handle in handles {
            match handle.await {
                Ok(Ok(id)) => assert!(ids.insert(id), "id handed out twice"),
                Ok(Err(LeaseError::PoolExhausted)) => exhausted += 1,
                other => panic!("unexpected assign result: {other:?}"),
            }
        }
        assert_eq!(ids.len(), 20);
        assert_eq!(exhausted, 10);
    }

    #[tokio::test]
    async fn free_after_assign_returns_token_to_available() {
        let service = make_service();
        assert_ok!(service.create_tokens(1).await);
        let id = assert_ok!(service.assign_token().await);

        assert_ok!(service.free_token(&id).await);

        assert!(in_set(&service, AVAILABLE_SET, &id).await);
        assert!(!in_set(&service, ASSIGNED_SET, &id).await);
        let info = assert_ok!(service.get_token(&id).await);
        assert_eq!(info.status, TokenStatus::Available);
    }

    #[tokio::test]
    async fn second_free_fails_not_found() {
        let service = make_service();
        assert_ok!(service.create_tokens(1).await);
        let id = assert_ok!(service.assign_token().await);

        assert_ok!(service.free_token(&id).await);
        let err = assert_err!(service.free_token(&id).await);
        assert!(matches!(err, LeaseError::TokenNotFound(_)));
    }

    #[tokio::test]
    async fn free_of_available_token_fails_not_found() {
        let service = make_service();
        let created = assert_ok!(service.create_tokens(1).await);
        let Some(id) = created.first() else {
            panic!("expected one token");
        };

        let err = assert_err!(service.free_token(id).await);
        assert!(matches!(err, LeaseError::TokenNotFound(_)));
        assert!(in_set(&service, AVAILABLE_SET, id).await);
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found() {
        let service = make_service();
        let created = assert_ok!(service.create_tokens(1).await);
        let Some(id) = created.first() else {
            panic!("expected one token");
        };

        assert_ok!(service.delete_token(id).await);
        for _ in 0..2 {
            let err = assert_err!(service.delete_token(id).await);
            assert!(matches!(err, LeaseError::TokenNotFound(_)));
        }
        assert_eq!(stats(&service).await, PoolStats::default());
    }

    #[tokio::test]
    async fn deleted_assigned_token_cannot_be_freed() {
        let service = make_service();
        assert_ok!(service.create_tokens(1).await);
        let id = assert_ok!(service.assign_token().await);

        assert_ok!(service.delete_token(&id).await);

        assert!(!in_set(&service, ASSIGNED_SET, &id).await);
        let err = assert_err!(service.free_token(&id).await);
        assert!(matches!(err, LeaseError::TokenNotFound(_)));
        let err = assert_err!(service.get_token(&id).await);
        assert!(matches!(err, LeaseError::TokenNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_extends_assigned_ttl_without_moving_sets() {
        let service = make_service();
        assert_ok!(service.create_tokens(1).await);
        let id = assert_ok!(service.assign_token().await);

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_ok!(service.keep_alive(&id).await);

        let remaining = service.store().ttl(&token_key(&id)).await;
        assert!(matches!(remaining, Ok(Some(ttl)) if ttl == KEEP_ALIVE_EXPIRY));

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(in_set(&service, ASSIGNED_SET, &id).await);
        assert!(!in_set(&service, AVAILABLE_SET, &id).await);
        let info = assert_ok!(service.get_token(&id).await);
        assert_eq!(info.status, TokenStatus::Assigned);
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_on_available_token_uses_idle_ttl() {
        let service = make_service();
        let created = assert_ok!(service.create_tokens(1).await);
        let Some(id) = created.first() else {
            panic!("expected one token");
        };

        tokio::time::advance(Duration::from_secs(100)).await;
        assert_ok!(service.keep_alive(id).await);

        let remaining = service.store().ttl(&token_key(id)).await;
        assert!(matches!(remaining, Ok(Some(ttl)) if ttl == TOKEN_EXPIRY));
        assert!(in_set(&service, AVAILABLE_SET, id).await);
    }

    #[tokio::test]
    async fn keep_alive_on_unknown_token_fails_not_found() {
        let service = make_service();
        let err = assert_err!(service.keep_alive(&TokenId::from("missing")).await);
        assert!(matches!(err, LeaseError::TokenNotFound(_)));
    }

    #[tokio::test]
    async fn list_all_reports_both_statuses() {
        let service = make_service();
        assert_ok!(service.create_tokens(3).await);
        let assigned = assert_ok!(service.assign_token().await);

        let all = assert_ok!(service.list_all().await);
        assert_eq!(all.len(), 3);
        let statuses: Vec<_> = all
            .iter()
            .filter(|t| t.id == assigned)
            .map(|t| t.status)
            .collect();
        assert_eq!(statuses, vec![TokenStatus::Assigned]);
        assert_eq!(
            all.iter()
                .filter(|t| t.status == TokenStatus::Available)
                .count(),
            2
        );
        assert!(all.iter().all(|t| t.expires_at > Utc::now()));

        let leased = assert_ok!(service.list_assigned().await);
        assert_eq!(leased.len(), 1);
        assert!(leased.iter().all(|t| t.id == assigned));
    }

    #[tokio::test]
    async fn list_all_reports_token_in_both_sets_once() {
        let service = make_service();
        assert_ok!(service.create_tokens(1).await);
        let id = assert_ok!(service.assign_token().await);
        assert_ok!(service.store().set_add(AVAILABLE_SET, id.as_str()).await);

        let all = assert_ok!(service.list_all().await);
        assert_eq!(all.len(), 1);
        assert!(all.iter().all(|t| t.status == TokenStatus::Assigned));
    }
}
