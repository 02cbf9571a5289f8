//! `GET /manifest.json` — static addon metadata.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CatalogDescriptor {
    #[serde(rename = "type")]
    pub content_type: String,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub id: String,
    pub version: String,
    pub name: String,
    pub description: String,
    pub resources: Vec<String>,
    pub types: Vec<String>,
    #[serde(rename = "idPrefixes")]
    pub id_prefixes: Vec<String>,
    pub catalogs: Vec<CatalogDescriptor>,
}

pub async fn manifest() -> Json<Manifest> {
    Json(Manifest {
        id: "org.streamres".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        name: "StreamRes".to_string(),
        description: "Resolves content identifiers into ranked P2P stream sources".to_string(),
        resources: vec![
            "stream".to_string(),
            "catalog".to_string(),
            "meta".to_string(),
        ],
        types: vec![
            "movie".to_string(),
            "series".to_string(),
            "anime".to_string(),
            "tv".to_string(),
        ],
        id_prefixes: vec![
            "tt".to_string(),
            "kitsu:".to_string(),
            "mal:".to_string(),
            "anilist:".to_string(),
            "anidb:".to_string(),
        ],
        catalogs: vec![CatalogDescriptor {
            content_type: "tv".to_string(),
            id: "streamres-tv".to_string(),
            name: "Live TV".to_string(),
        }],
    })
}
