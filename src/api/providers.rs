//! `GET /api/providers/stats` — per-provider availability snapshot.

use axum::extract::State;
use axum::Json;

use crate::search::ProviderAvailability;
use crate::AppState;

pub async fn providers_stats(State(state): State<AppState>) -> Json<Vec<ProviderAvailability>> {
    Json(state.search_orchestrator.provider_stats_snapshot())
}
