//! Lease pool error types with HTTP status code mapping.
//!
//! [`LeaseError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::TokenId;
use crate::store::StoreError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "token not found: 5b0c...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Service error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | Not Found       | 404 Not Found                |
/// | 3000–3999 | Server / Store  | 500 / 503                    |
#[derive(Debug, thiserror::Error)]
pub enum LeaseError {
    /// Input rejected before touching the store.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The token key is absent or the token is not in the required set.
    #[error("token not found: {0}")]
    TokenNotFound(TokenId),

    /// No token is available to assign.
    #[error("no token available")]
    PoolExhausted,

    /// The store failed; the operation may be retried by the caller.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Reconciling an expired key failed. Logged by the reconciler, never
    /// returned to a caller.
    #[error("reconciliation of {key} failed: {source}")]
    Reconciliation {
        /// Expired key being reconciled.
        key: String,
        /// Underlying store failure.
        source: StoreError,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LeaseError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidArgument(_) => 1001,
            Self::TokenNotFound(_) => 2001,
            Self::PoolExhausted => 2002,
            Self::Internal(_) => 3000,
            Self::Store(_) => 3001,
            Self::Reconciliation { .. } => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::TokenNotFound(_) | Self::PoolExhausted => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Reconciliation { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LeaseError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
