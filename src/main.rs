//! lease-pool server entry point.
//!
//! Connects the store, starts the expiry reconciler, and serves the REST
//! API until interrupted.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use lease_pool::api;
use lease_pool::app_state::AppState;
use lease_pool::config::LeaseConfig;
use lease_pool::service::{ExpiryReconciler, LeaseService};
use lease_pool::store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = LeaseConfig::from_env()?;
    tracing::info!(
        addr = %config.listen_addr,
        backend = %config.store_backend,
        token_expiry_secs = config.token_expiry_secs,
        keep_alive_expiry_secs = config.keep_alive_expiry_secs,
        "starting lease-pool"
    );

    // Acquire the store and start listening for expiries
    let lease_store = store::connect(&config).await?;
    let timings = config.timings();
    let reconciler = ExpiryReconciler::new(Arc::clone(&lease_store), timings).spawn();

    // Build service layer
    let lease_service = Arc::new(LeaseService::new(Arc::clone(&lease_store), timings));
    let app_state = AppState { lease_service };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Release background work and connections whatever the server outcome
    reconciler.shutdown().await;
    lease_store.shutdown().await;
    tracing::info!("lease-pool stopped");

    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
