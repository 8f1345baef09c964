//! TTL settings shared by the pool manager and the reconciler.

use std::time::Duration;

use super::TokenStatus;

/// The two store-enforced lifetimes of a token key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseTimings {
    /// How long an available token survives without being assigned.
    pub token_expiry: Duration,
    /// How long an assigned token survives without a keep-alive.
    pub keep_alive_expiry: Duration,
}

impl LeaseTimings {
    /// Creates timings from the two TTLs.
    #[must_use]
    pub const fn new(token_expiry: Duration, keep_alive_expiry: Duration) -> Self {
        Self {
            token_expiry,
            keep_alive_expiry,
        }
    }

    /// TTL applied to a token key entering `status`.
    #[must_use]
    pub const fn ttl_for(&self, status: TokenStatus) -> Duration {
        match status {
            TokenStatus::Available => self.token_expiry,
            TokenStatus::Assigned => self.keep_alive_expiry,
        }
    }
}
