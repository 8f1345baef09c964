//! Router-level tests driving the REST API through `tower::ServiceExt`.

#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use lease_pool::api::build_router;
use lease_pool::api::dto::{AssignTokenResponse, CreateTokensResponse};
use lease_pool::api::handlers::system::HealthResponse;
use lease_pool::app_state::AppState;
use lease_pool::domain::LeaseTimings;
use lease_pool::service::{LeaseService, MAX_CREATE_BATCH};
use lease_pool::store::{InMemoryStore, KeyValueStore};

fn app() -> Router {
    let store: Arc<dyn KeyValueStore> = InMemoryStore::start(Duration::from_millis(100), 1000);
    let timings = LeaseTimings::new(Duration::from_secs(600), Duration::from_secs(60));
    let lease_service = Arc::new(LeaseService::new(store, timings));
    build_router().with_state(AppState { lease_service })
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    };
    let Ok(request) = request else {
        panic!("invalid request");
    };
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router failed");
    };
    let status = response.status();
    let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body read failed");
    };
    (status, bytes.to_vec())
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
    let Ok(value) = serde_json::from_slice(bytes) else {
        panic!("unexpected body: {}", String::from_utf8_lossy(bytes));
    };
    value
}

async fn create(app: &Router, count: i64) -> CreateTokensResponse {
    let body = format!("{{\"count\": {count}}}");
    let (status, bytes) = send(app, Method::POST, "/api/v1/tokens", Some(&body)).await;
    assert_eq!(status, StatusCode::CREATED);
    parse(&bytes)
}

async fn assign(app: &Router) -> AssignTokenResponse {
    let (status, bytes) = send(app, Method::POST, "/api/v1/tokens/assign", None).await;
    assert_eq!(status, StatusCode::OK);
    parse(&bytes)
}

#[tokio::test]
async fn create_then_assign_until_exhausted() {
    let app = app();
    let created = create(&app, 3).await;
    assert_eq!(created.created, 3);

    for _ in 0..3 {
        let _ = assign(&app).await;
    }

    let (status, bytes) = send(&app, Method::POST, "/api/v1/tokens/assign", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: serde_json::Value = parse(&bytes);
    assert_eq!(body["error"]["code"], 2002);
}

#[tokio::test]
async fn non_positive_count_is_bad_request() {
    let app = app();
    let (status, bytes) = send(&app, Method::POST, "/api/v1/tokens", Some("{\"count\": 0}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: serde_json::Value = parse(&bytes);
    assert_eq!(body["error"]["code"], 1001);
}

#[tokio::test]
async fn oversized_count_is_bad_request() {
    let app = app();
    for count in [MAX_CREATE_BATCH + 1, i64::MAX] {
        let body = format!("{{\"count\": {count}}}");
        let (status, bytes) = send(&app, Method::POST, "/api/v1/tokens", Some(&body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: serde_json::Value = parse(&bytes);
        assert_eq!(body["error"]["code"], 1001);
    }

    let (status, bytes) = send(&app, Method::GET, "/api/v1/tokens", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = parse(&bytes);
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn lease_lifecycle_over_http() {
    let app = app();
    let _ = create(&app, 2).await;
    let leased = assign(&app).await;
    let id = leased.token_id;

    let (status, _) = send(&app, Method::POST, &format!("/api/v1/tokens/{id}/keep-alive"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, bytes) = send(&app, Method::GET, "/api/v1/tokens/assigned", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = parse(&bytes);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["id"], id.as_str());

    let (status, _) = send(&app, Method::POST, &format!("/api/v1/tokens/{id}/free"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, bytes) = send(&app, Method::GET, &format!("/api/v1/tokens/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = parse(&bytes);
    assert_eq!(body["status"], "available");

    let (status, _) = send(&app, Method::POST, &format!("/api/v1/tokens/{id}/free"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleted_token_is_gone() {
    let app = app();
    let _ = create(&app, 1).await;
    let id = assign(&app).await.token_id;

    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/tokens/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/tokens/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::POST, &format!("/api/v1/tokens/{id}/free"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, bytes) = send(&app, Method::GET, "/api/v1/tokens", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = parse(&bytes);
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn list_tokens_is_paginated() {
    let app = app();
    let _ = create(&app, 5).await;

    let (status, bytes) = send(&app, Method::GET, "/api/v1/tokens?page=2&per_page=2", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = parse(&bytes);
    assert_eq!(body["pagination"]["total"], 5);
    assert_eq!(body["pagination"]["total_pages"], 3);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn health_reports_pool_sizes() {
    let app = app();
    let _ = create(&app, 2).await;
    let _ = assign(&app).await;

    let (status, bytes) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = parse(&bytes);
    assert_eq!(health.status, "healthy");
    let Some(pool) = health.pool else {
        panic!("expected pool stats");
    };
    assert_eq!((pool.available, pool.assigned), (1, 1));
}
