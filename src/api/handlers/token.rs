//! Token lease handlers: create, assign, free, keep-alive, delete, list.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    AssignTokenResponse, AssignedTokenListResponse, CreateTokensRequest, CreateTokensResponse,
    PaginationParams, TokenListResponse,
};
use crate::app_state::AppState;
use crate::domain::{TokenId, TokenInfo};
use crate::error::{ErrorResponse, LeaseError};

/// `POST /tokens` — Add tokens to the pool.
///
/// # Errors
///
/// Returns [`LeaseError::InvalidArgument`] if `count` is not positive or
/// exceeds the per-call batch limit.
#[utoipa::path(
    post,
    path = "/api/v1/tokens",
    tag = "Tokens",
    summary = "Create tokens",
    description = "Adds `count` fresh tokens to the available set. Each survives `TOKEN_EXPIRY` seconds unless assigned.",
    request_body = CreateTokensRequest,
    responses(
        (status = 201, description = "Tokens created", body = CreateTokensResponse),
        (status = 400, description = "Count not positive or above the batch limit", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn create_tokens(
    State(state): State<AppState>,
    Json(req): Json<CreateTokensRequest>,
) -> Result<impl IntoResponse, LeaseError> {
    let token_ids = state.lease_service.create_tokens(req.count).await?;
    let response = CreateTokensResponse {
        created: token_ids.len(),
        token_ids,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /tokens` — List every live token.
///
/// # Errors
///
/// Returns [`LeaseError::Store`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/tokens",
    tag = "Tokens",
    summary = "List tokens",
    description = "Point-in-time snapshot of all tokens with status and expiry.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated token list", body = TokenListResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn list_tokens(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, LeaseError> {
    let tokens = state.lease_service.list_all().await?;
    let (data, pagination) = params.paginate(tokens);
    Ok(Json(TokenListResponse { data, pagination }))
}

/// `GET /tokens/assigned` — List leased tokens.
///
/// # Errors
///
/// Returns [`LeaseError::Store`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/tokens/assigned",
    tag = "Tokens",
    summary = "List assigned tokens",
    description = "Point-in-time snapshot of leased tokens with the instant each lease lapses.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated assigned token list", body = AssignedTokenListResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn list_assigned(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, LeaseError> {
    let tokens = state.lease_service.list_assigned().await?;
    let (data, pagination) = params.paginate(tokens);
    Ok(Json(AssignedTokenListResponse { data, pagination }))
}

/// `POST /tokens/assign` — Lease an available token.
///
/// # Errors
///
/// Returns [`LeaseError::PoolExhausted`] if no token is available.
#[utoipa::path(
    post,
    path = "/api/v1/tokens/assign",
    tag = "Tokens",
    summary = "Assign a token",
    description = "Removes an arbitrary token from the available set and leases it for `KEEP_ALIVE_EXPIRY` seconds.",
    responses(
        (status = 200, description = "Token leased", body = AssignTokenResponse),
        (status = 404, description = "No token available", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn assign_token(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, LeaseError> {
    let token_id = state.lease_service.assign_token().await?;
    Ok(Json(AssignTokenResponse { token_id }))
}

/// `GET /tokens/{id}` — Get one token.
///
/// # Errors
///
/// Returns [`LeaseError::TokenNotFound`] if the token does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/tokens/{id}",
    tag = "Tokens",
    summary = "Get a token",
    params(
        ("id" = String, Path, description = "Token identifier"),
    ),
    responses(
        (status = 200, description = "Token snapshot", body = TokenInfo),
        (status = 404, description = "Token not found", body = ErrorResponse),
    )
)]
pub async fn get_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, LeaseError> {
    let info = state.lease_service.get_token(&TokenId::from(id)).await?;
    Ok(Json(info))
}

/// `POST /tokens/{id}/free` — Release a leased token.
///
/// # Errors
///
/// Returns [`LeaseError::TokenNotFound`] if the token is not assigned.
#[utoipa::path(
    post,
    path = "/api/v1/tokens/{id}/free",
    tag = "Tokens",
    summary = "Free a token",
    description = "Returns an assigned token to the available set.",
    params(
        ("id" = String, Path, description = "Token identifier"),
    ),
    responses(
        (status = 204, description = "Token freed"),
        (status = 404, description = "Token not assigned", body = ErrorResponse),
    )
)]
pub async fn free_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, LeaseError> {
    state.lease_service.free_token(&TokenId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /tokens/{id}/keep-alive` — Renew a token's TTL.
///
/// # Errors
///
/// Returns [`LeaseError::TokenNotFound`] if the token does not exist.
#[utoipa::path(
    post,
    path = "/api/v1/tokens/{id}/keep-alive",
    tag = "Tokens",
    summary = "Keep a token alive",
    description = "Resets the TTL: `KEEP_ALIVE_EXPIRY` for assigned tokens, `TOKEN_EXPIRY` otherwise.",
    params(
        ("id" = String, Path, description = "Token identifier"),
    ),
    responses(
        (status = 204, description = "TTL refreshed"),
        (status = 404, description = "Token not found", body = ErrorResponse),
    )
)]
pub async fn keep_alive(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, LeaseError> {
    state.lease_service.keep_alive(&TokenId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /tokens/{id}` — Remove a token permanently.
///
/// # Errors
///
/// Returns [`LeaseError::TokenNotFound`] if the token does not exist.
#[utoipa::path(
    delete,
    path = "/api/v1/tokens/{id}",
    tag = "Tokens",
    summary = "Delete a token",
    params(
        ("id" = String, Path, description = "Token identifier"),
    ),
    responses(
        (status = 204, description = "Token deleted"),
        (status = 404, description = "Token not found", body = ErrorResponse),
    )
)]
pub async fn delete_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, LeaseError> {
    state.lease_service.delete_token(&TokenId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Token routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tokens", post(create_tokens).get(list_tokens))
        .route("/tokens/assigned", get(list_assigned))
        .route("/tokens/assign", post(assign_token))
        .route("/tokens/{id}", get(get_token).delete(delete_token))
        .route("/tokens/{id}/free", post(free_token))
        .route("/tokens/{id}/keep-alive", post(keep_alive))
}
