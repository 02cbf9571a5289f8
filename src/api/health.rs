//! `GET /api/health` — liveness, version, uptime and a circuit-breaker /
//! provider snapshot.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::search::ProviderAvailability;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(rename = "uptimeSeconds")]
    pub uptime_seconds: u64,
    #[serde(rename = "openCircuitBreakers")]
    pub open_circuit_breakers: Vec<String>,
    pub providers: Vec<ProviderAvailability>,
    pub cache: crate::cache::CacheStats,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        open_circuit_breakers: state.error_router.open_breakers(),
        providers: state.search_orchestrator.provider_stats_snapshot(),
        cache: state.cache.stats(),
    })
}
