//! `POST /api/cache/clean` — forces an expiry + pressure sweep.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CacheCleanResponse {
    pub swept: bool,
    pub stats: crate::cache::CacheStats,
}

pub async fn cache_clean(State(state): State<AppState>) -> Json<CacheCleanResponse> {
    state.cache.force_sweep();
    Json(CacheCleanResponse {
        swept: true,
        stats: state.cache.stats(),
    })
}
