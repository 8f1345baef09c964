//! Token DTOs for create, assign, and list operations.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::{AssignedToken, TokenId, TokenInfo};

/// Request body for `POST /tokens`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateTokensRequest {
    /// Number of tokens to add to the pool. Must be positive.
    pub count: i64,
}

/// Response body for `POST /tokens` (201 Created).
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateTokensResponse {
    /// Number of tokens created.
    pub created: usize,
    /// Identifiers of the new tokens.
    pub token_ids: Vec<TokenId>,
}

/// Response body for `POST /tokens/assign`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AssignTokenResponse {
    /// The leased token.
    pub token_id: TokenId,
}

/// Paginated list response for `GET /tokens`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenListResponse {
    /// Token snapshots.
    pub data: Vec<TokenInfo>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Paginated list response for `GET /tokens/assigned`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssignedTokenListResponse {
    /// Assigned token snapshots.
    pub data: Vec<AssignedToken>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
