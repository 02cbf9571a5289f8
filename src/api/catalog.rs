//! `GET /catalog/{type}/{catalogId}.json` — paged catalog. Only the TV
//! catalog's interface shape is specified; it always returns an empty,
//! correctly-shaped page since no live-TV playlist source is wired up.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub skip: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CatalogMetaPreview {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub metas: Vec<CatalogMetaPreview>,
}

pub async fn catalog(
    State(_state): State<AppState>,
    Path((content_type, catalog_id)): Path<(String, String)>,
    Query(query): Query<CatalogQuery>,
) -> Json<CatalogResponse> {
    tracing::debug!(
        content_type,
        catalog_id = catalog_id.trim_end_matches(".json"),
        ?query,
        "catalog request (interface shape only, no backing source)"
    );
    Json(CatalogResponse { metas: Vec::new() })
}
