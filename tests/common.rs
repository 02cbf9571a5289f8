//! Test infrastructure for StreamRes integration tests.
//!
//! Provides a `TestApp` wrapper around `axum_test::TestServer` built from the
//! same `AppState` production wiring uses, minus a bound TCP listener.

use std::sync::Arc;
use std::time::Instant;

use axum_test::TestServer;

use streamres::cache::Cache;
use streamres::config::Config;
use streamres::error_router::ErrorRouter;
use streamres::ids::UnifiedIdService;
use streamres::metadata::MetadataClient;
use streamres::pipeline::RequestPipeline;
use streamres::repository::{CascadingMagnetRepository, RemoteAggregatorClient};
use streamres::search::providers::{FourKProvider, GeneralProvider, LatinoProvider, ScrapeProvider};
use streamres::search::SearchOrchestrator;
use streamres::AppState;

/// Test application wrapper around `axum_test::TestServer`.
pub struct TestApp {
    server: TestServer,
}

impl TestApp {
    /// Builds a complete router identical to production, with no snapshot
    /// stores and an unreachable aggregator base URL so every lookup falls
    /// through to an empty result instead of making a real network call.
    pub async fn new() -> Self {
        let config = Config::load_from("nonexistent.toml").expect("default config");

        let cache = Cache::new_without_sweep(config.cache.clone());
        let error_router = Arc::new(ErrorRouter::new());
        let unified_id_service = Arc::new(UnifiedIdService::new(config.mapping.clone()));
        let metadata_client = Arc::new(MetadataClient::new(&config.metadata));

        let aggregator = Arc::new(RemoteAggregatorClient::new(config.aggregator.clone()));
        let repository = Arc::new(CascadingMagnetRepository::new(
            cache.clone(),
            Vec::new(),
            aggregator,
            error_router.clone(),
        ));

        let providers: Vec<Arc<dyn ScrapeProvider>> = vec![
            Arc::new(FourKProvider::new()),
            Arc::new(GeneralProvider::new()),
            Arc::new(LatinoProvider::new()),
        ];
        let search_orchestrator = Arc::new(SearchOrchestrator::new(providers, cache.clone(), &config));

        let pipeline = Arc::new(RequestPipeline::new(
            cache.clone(),
            repository.clone(),
            metadata_client.clone(),
            error_router.clone(),
        ));

        let state = AppState {
            config: Arc::new(config),
            cache,
            error_router,
            unified_id_service,
            repository,
            search_orchestrator,
            metadata_client,
            pipeline,
            start_time: Instant::now(),
        };

        let app = streamres::api::router(state);
        let server = TestServer::new(app).expect("test server");

        Self { server }
    }

    pub fn server(&self) -> &TestServer {
        &self.server
    }
}
