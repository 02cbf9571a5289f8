//! `GET /stream/{type}/{id}.json` — the addon's core resolution endpoint.

use axum::extract::{Path, State};
use axum::Json;

use crate::pipeline::StreamResponse;
use crate::AppState;

pub async fn stream(
    State(state): State<AppState>,
    Path((content_type, raw_id)): Path<(String, String)>,
) -> Json<StreamResponse> {
    let id = raw_id.strip_suffix(".json").unwrap_or(&raw_id);
    let response = state.pipeline.handle(&content_type, id).await;
    Json(response)
}
