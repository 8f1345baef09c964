//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Lease endpoints are mounted under `/api/v1`; the health check sits at
//! the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "lease-pool", description = "Bounded pool of leased tokens"),
    paths(
        handlers::token::create_tokens,
        handlers::token::list_tokens,
        handlers::token::list_assigned,
        handlers::token::assign_token,
        handlers::token::get_token,
        handlers::token::free_token,
        handlers::token::keep_alive,
        handlers::token::delete_token,
        handlers::system::health_handler,
    ),
    tags(
        (name = "Tokens", description = "Token lease lifecycle"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}
