//! StreamRes backend library.
//!
//! Resolves content identifiers into ranked P2P stream descriptors through a
//! Stremio-compatible JSON HTTP protocol. Exposes every module for use in
//! integration tests.

use std::sync::Arc;
use std::time::Instant;

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod error_router;
pub mod ids;
pub mod magnet;
pub mod metadata;
pub mod pipeline;
pub mod repository;
pub mod search;
pub mod stream_assembler;

use cache::Cache;
use config::Config;
use error_router::ErrorRouter;
use ids::UnifiedIdService;
use metadata::MetadataClient;
use pipeline::RequestPipeline;
use repository::CascadingMagnetRepository;
use search::SearchOrchestrator;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Cache,
    pub error_router: Arc<ErrorRouter>,
    pub unified_id_service: Arc<UnifiedIdService>,
    pub repository: Arc<CascadingMagnetRepository>,
    pub search_orchestrator: Arc<SearchOrchestrator>,
    pub metadata_client: Arc<MetadataClient>,
    pub pipeline: Arc<RequestPipeline>,
    pub start_time: Instant,
}
