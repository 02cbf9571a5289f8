//! `GET /api/search` and `POST /api/search` — the scraping-search surface,
//! wired directly to the [`crate::search::SearchOrchestrator`].

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::search::{SearchOptions, SearchOutcome, SearchQuery, SortBy};
use crate::AppState;

/// Shared request shape for both the `GET` query string and the `POST` body.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub term: String,
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
    #[serde(rename = "imdbId", default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub episode: Option<u32>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(rename = "maxResults", default)]
    pub max_results: Option<usize>,
    #[serde(rename = "sortBy", default)]
    pub sort_by: Option<String>,
    #[serde(rename = "skipCache", default)]
    pub skip_cache: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<crate::magnet::MagnetDescriptor>,
    #[serde(rename = "providerStats")]
    pub provider_stats: Vec<crate::search::ProviderOutcome>,
    #[serde(rename = "fromCache")]
    pub from_cache: bool,
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            results: outcome.results,
            provider_stats: outcome.provider_stats,
            from_cache: outcome.from_cache,
        }
    }
}

fn build_query_and_options(params: SearchParams) -> (SearchQuery, SearchOptions) {
    let query = SearchQuery {
        term: params.term,
        content_type: params.content_type,
        imdb_id: params.imdb_id,
        year: params.year,
        quality: params.quality,
        language: params.language,
        season: params.season,
        episode: params.episode,
    };
    let options = SearchOptions {
        providers: params.provider.map(|p| vec![p]),
        skip_cache: params.skip_cache.unwrap_or(false),
        sort_by: params.sort_by.as_deref().map(SortBy::parse).unwrap_or(SortBy::Quality),
        max_results: params.max_results,
    };
    (query, options)
}

/// `GET /api/search`
pub async fn search_get(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let (query, options) = build_query_and_options(params);
    let outcome = state.search_orchestrator.search(query, options).await;
    Json(outcome.into())
}

/// `POST /api/search`
pub async fn search_post(
    State(state): State<AppState>,
    Json(params): Json<SearchParams>,
) -> Json<SearchResponse> {
    let (query, options) = build_query_and_options(params);
    let outcome = state.search_orchestrator.search(query, options).await;
    Json(outcome.into())
}
