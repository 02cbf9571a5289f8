//! `GET /meta/{type}/{id}.json` — meta record, backed by the optional
//! metadata-enrichment collaborator. Out-of-core surface; shape only.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MetaRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct MetaResponse {
    pub meta: MetaRecord,
}

pub async fn meta(
    State(state): State<AppState>,
    Path((content_type, raw_id)): Path<(String, String)>,
) -> Json<MetaResponse> {
    let id = raw_id.strip_suffix(".json").unwrap_or(&raw_id).to_string();

    let (name, year) = match state.metadata_client.lookup(&id).await {
        Ok(enrichment) => (enrichment.title.unwrap_or_else(|| id.clone()), enrichment.year),
        Err(_) => (id.clone(), None),
    };

    Json(MetaResponse {
        meta: MetaRecord {
            id,
            content_type,
            name,
            year,
        },
    })
}
