//! Store-level error type.

use std::time::Duration;

/// Failure reported by a [`super::KeyValueStore`] backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// No connection could be acquired, so the request never left the
    /// client.
    #[error("store unreachable: {0}")]
    Unreachable(String),

    /// The connection failed mid-request (I/O or TLS failure). The
    /// statement may or may not have been applied.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A single attempt did not complete within the configured timeout.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The backend rejected the operation.
    #[error("store backend error: {0}")]
    Backend(String),

    /// The store has been shut down.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Returns `true` for failures worth retrying when repeating the
    /// operation is harmless.
    ///
    /// [`Self::Unavailable`] and [`Self::Timeout`] are included even though
    /// the first attempt may already have been applied, so only idempotent
    /// operations may be retried on this classification. Claims such as
    /// set removal and pop must use [`Self::is_unsent`].
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unreachable(_) | Self::Unavailable(_) | Self::Timeout(_)
        )
    }

    /// Returns `true` only when the failed attempt cannot have reached the
    /// backend, so retrying cannot apply the operation twice.
    #[must_use]
    pub const fn is_unsent(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::Unreachable(err.to_string()),
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => Self::Unavailable(err.to_string()),
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => Self::Closed,
            other => Self::Backend(other.to_string()),
        }
    }
}
