//! HTTP surface: the thin collaborator exposing the resolution pipeline,
//! search orchestrator and cache/health admin endpoints as Stremio-compatible
//! JSON routes.

pub mod cache_admin;
pub mod catalog;
pub mod health;
pub mod manifest;
pub mod meta;
pub mod providers;
pub mod search;
pub mod stream;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::AppState;

#[derive(Serialize)]
struct NotFoundResponse {
    error: String,
    message: String,
    endpoints: Vec<&'static str>,
}

async fn not_found() -> impl IntoResponse {
    let body = NotFoundResponse {
        error: "NOT_FOUND".to_string(),
        message: "unknown endpoint".to_string(),
        endpoints: vec![
            "GET /manifest.json",
            "GET /stream/{type}/{id}.json",
            "GET /catalog/{type}/{catalogId}.json",
            "GET /meta/{type}/{id}.json",
            "GET /api/search",
            "POST /api/search",
            "GET /api/providers/stats",
            "POST /api/cache/clean",
            "GET /api/health",
        ],
    };
    (StatusCode::NOT_FOUND, Json(body))
}

/// Builds the full addon router, mirroring the teacher's route-assembly
/// style: plain routes, no nesting needed since every path is flat.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/manifest.json", get(manifest::manifest))
        .route("/stream/{type}/{id}", get(stream::stream))
        .route("/catalog/{type}/{catalogId}", get(catalog::catalog))
        .route("/meta/{type}/{id}", get(meta::meta))
        .route(
            "/api/search",
            get(search::search_get).post(search::search_post),
        )
        .route("/api/providers/stats", get(providers::providers_stats))
        .route("/api/cache/clean", post(cache_admin::cache_clean))
        .route("/api/health", get(health::health))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
