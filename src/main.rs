use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod cache;
mod config;
mod error;
mod error_router;
mod ids;
mod magnet;
mod metadata;
mod pipeline;
mod repository;
mod search;
mod stream_assembler;

use cache::Cache;
use config::Config;
use error_router::ErrorRouter;
use ids::UnifiedIdService;
use metadata::MetadataClient;
use pipeline::RequestPipeline;
use repository::{CascadingMagnetRepository, RemoteAggregatorClient, TabularSnapshotStore};
use search::providers::{FourKProvider, GeneralProvider, LatinoProvider, ScrapeProvider};
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

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("streamres=debug,tower_http=debug,axum=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    tracing::info!("Starting StreamRes v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::load() {
        Ok(cfg) => {
            tracing::info!("Configuration loaded successfully");
            tracing::debug!("Server: {}:{}", cfg.server.host, cfg.server.port);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let cache = Cache::new(config.cache.clone());
    let error_router = Arc::new(ErrorRouter::new());
    let unified_id_service = Arc::new(UnifiedIdService::new(config.mapping.clone()));
    let metadata_client = Arc::new(MetadataClient::new(&config.metadata));

    let stores: Vec<Arc<TabularSnapshotStore>> = config
        .snapshots
        .iter()
        .map(|source| Arc::new(TabularSnapshotStore::new(source)))
        .collect();
    tracing::info!(count = stores.len(), "snapshot stores configured");

    let aggregator = Arc::new(RemoteAggregatorClient::new(config.aggregator.clone()));
    let repository = Arc::new(CascadingMagnetRepository::new(
        cache.clone(),
        stores,
        aggregator,
        error_router.clone(),
    ));

    let providers: Vec<Arc<dyn ScrapeProvider>> = vec![
        Arc::new(FourKProvider::new()),
        Arc::new(GeneralProvider::new()),
        Arc::new(LatinoProvider::new()),
    ];
    tracing::info!(count = providers.len(), "scraping providers registered");
    let search_orchestrator = Arc::new(SearchOrchestrator::new(providers, cache.clone(), &config));

    let pipeline = Arc::new(RequestPipeline::new(
        cache.clone(),
        repository.clone(),
        metadata_client.clone(),
        error_router.clone(),
    ));

    let addr = config.server_addr();

    let state = AppState {
        config: Arc::new(config),
        cache: cache.clone(),
        error_router,
        unified_id_service,
        repository,
        search_orchestrator,
        metadata_client,
        pipeline,
        start_time: Instant::now(),
    };

    let app = api::router(state);

    tracing::info!("StreamRes listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    cache.shutdown();
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("shutdown signal received");
}
