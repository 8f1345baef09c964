//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::PoolStats;

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    /// Server time (RFC 3339).
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Set sizes, absent when the store is unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStatsDto>,
}

/// Pool set sizes as reported by the health endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PoolStatsDto {
    /// Tokens waiting to be assigned.
    pub available: usize,
    /// Tokens currently leased.
    pub assigned: usize,
}

impl From<PoolStats> for PoolStatsDto {
    fn from(stats: PoolStats) -> Self {
        Self {
            available: stats.available,
            assigned: stats.assigned,
        }
    }
}

/// `GET /health` — Service and store health.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Pings the store and reports pool set sizes, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let service = &state.lease_service;
    let pool = match service.store().ping().await {
        Ok(()) => service.pool_stats().await.ok(),
        Err(e) => {
            tracing::warn!(error = %e, "health check: store ping failed");
            None
        }
    };

    let (status, label) = if pool.is_some() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            pool: pool.map(PoolStatsDto::from),
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
