//! Point-in-time views of pool contents.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{TokenId, TokenStatus};

/// Snapshot of a single token as returned by listing operations.
///
/// `expires_at` is derived from the store's remaining TTL at read time and
/// may already be stale when the caller looks at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TokenInfo {
    /// Token identifier.
    pub id: TokenId,
    /// Current lease status.
    pub status: TokenStatus,
    /// Absolute instant at which the store will expire the token key.
    pub expires_at: DateTime<Utc>,
}

/// Snapshot of an assigned token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AssignedToken {
    /// Token identifier.
    pub id: TokenId,
    /// Instant at which the lease lapses unless renewed.
    pub expires_at: DateTime<Utc>,
}

/// Sizes of the two membership sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct PoolStats {
    /// Tokens waiting to be assigned.
    pub available: usize,
    /// Tokens currently leased.
    pub assigned: usize,
}
