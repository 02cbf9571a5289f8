//! Composes the whole stream-resolution contract:
//! detect → cache probe → validate → optional metadata enrichment →
//! repository lookup → assemble → cache store → respond. Every boundary
//! runs through the [`ErrorRouter`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::cache::{stream_cache_key, Cache, TtlHint};
use crate::error::ErrorKind;
use crate::error_router::{fallback_cache_max_age, ErrorRouter};
use crate::ids::{DynamicValidator, IdDetector, IdType, ValidationContext};
use crate::magnet::parse_embedded_episode;
use crate::metadata::MetadataClient;
use crate::repository::{CascadingMagnetRepository, LookupOptions};
use crate::stream_assembler::{self, StreamRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamResponse {
    pub streams: Vec<StreamRecord>,
    #[serde(rename = "cacheMaxAge")]
    pub cache_max_age: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl StreamResponse {
    fn empty(cache_max_age: u64) -> Self {
        Self {
            streams: Vec::new(),
            cache_max_age,
            error: None,
            error_type: None,
        }
    }

    fn validation_error(message: String) -> Self {
        Self {
            streams: Vec::new(),
            cache_max_age: fallback_cache_max_age(ErrorKind::Validation),
            error: Some(message),
            error_type: Some("VALIDATION_ERROR".to_string()),
        }
    }
}

/// Orchestrates one `handle({type, id})` stream request end to end.
pub struct RequestPipeline {
    cache: Cache,
    id_detector: IdDetector,
    repository: Arc<CascadingMagnetRepository>,
    metadata_client: Arc<MetadataClient>,
    error_router: Arc<ErrorRouter>,
}

impl RequestPipeline {
    pub fn new(
        cache: Cache,
        repository: Arc<CascadingMagnetRepository>,
        metadata_client: Arc<MetadataClient>,
        error_router: Arc<ErrorRouter>,
    ) -> Self {
        Self {
            cache,
            id_detector: IdDetector::new(),
            repository,
            metadata_client,
            error_router,
        }
    }

    pub async fn handle(&self, content_type: &str, raw_id: &str) -> StreamResponse {
        let request_id = Uuid::new_v4();
        tracing::info!(%request_id, content_type, id = raw_id, "stream request started");

        let detection = self.id_detector.detect(raw_id);
        let (season, episode) = parse_embedded_episode(raw_id).map_or((None, None), |(s, e)| (Some(s), Some(e)));

        let response_key = format!(
            "response:{}",
            stream_cache_key(content_type, raw_id, &detection.id_type.to_string(), season, episode)
        );

        if let Some(cached) = self.cache.get(&response_key) {
            if let Ok(response) = serde_json::from_str::<StreamResponse>(&cached) {
                tracing::debug!(%request_id, "stream response served from cache");
                return response;
            }
        }

        let validation = DynamicValidator::new().validate(&detection, ValidationContext::StreamRequest);
        if !validation.valid {
            let message = validation
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "validation failed".to_string());
            tracing::warn!(%request_id, error = %message, "stream request failed validation");
            return StreamResponse::validation_error(message);
        }

        let metadata = if detection.id_type == IdType::Numeric || !detection.is_valid {
            None
        } else if self.metadata_client.is_configured() {
            match self.metadata_client.lookup(raw_id).await {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    tracing::warn!(%request_id, error = %e, "metadata enrichment failed, proceeding without it");
                    None
                }
            }
        } else {
            None
        };

        let repository = self.repository.clone();
        let id = raw_id.to_string();
        let content_type_owned = content_type.to_string();
        let lookup = self
            .error_router
            .execute("request_pipeline.repository_lookup", move || {
                let repository = repository.clone();
                let id = id.clone();
                let content_type_owned = content_type_owned.clone();
                async move {
                    repository
                        .lookup(&id, &content_type_owned, LookupOptions { season, episode })
                        .await
                }
            })
            .await;

        let descriptors = match lookup {
            Ok(descriptors) => descriptors,
            Err(e) => {
                let cache_max_age = fallback_cache_max_age(e.kind);
                tracing::warn!(%request_id, error = %e, cache_max_age, "repository lookup failed, returning empty streams");
                let response = StreamResponse::empty(cache_max_age);
                self.store_response(&response_key, &response);
                return response;
            }
        };

        let streams = stream_assembler::assemble(descriptors, metadata.as_ref(), Some(&detection));

        let hint = TtlHint {
            stream_count: streams.len(),
            is_anime_family: detection.id_type.is_anime_family(),
            is_non_imdb_unknown: detection.id_type == IdType::Unknown,
        };
        let mut ttl = self.cache.adaptive_ttl(self.cache.default_ttl(), hint);
        if streams.is_empty() {
            ttl = ttl.min(Duration::from_secs(300));
        }

        let response = StreamResponse {
            streams,
            cache_max_age: ttl.as_secs(),
            error: None,
            error_type: None,
        };
        self.store_response(&response_key, &response);

        tracing::info!(%request_id, stream_count = response.streams.len(), "stream request completed");
        response
    }

    fn store_response(&self, key: &str, response: &StreamResponse) {
        if let Ok(serialized) = serde_json::to_string(response) {
            self.cache.set(
                key,
                serialized,
                Duration::from_secs(response.cache_max_age),
                "stream-response",
                None,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AggregatorConfig, CacheConfig, MetadataConfig};
    use crate::repository::RemoteAggregatorClient;

    fn test_pipeline() -> RequestPipeline {
        let cache = Cache::new_without_sweep(CacheConfig {
            enabled: true,
            max_memory_mb: 8,
            max_entries: 100,
            default_ttl_sec: 1800,
            sweep_period_sec: 300,
        });
        let repository = Arc::new(CascadingMagnetRepository::new(
            cache.clone(),
            Vec::new(),
            Arc::new(RemoteAggregatorClient::new(AggregatorConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                api_key: None,
                timeout_sec: 1,
                language_priority: vec!["en".to_string()],
            })),
            Arc::new(ErrorRouter::new()),
        ));
        RequestPipeline::new(
            cache,
            repository,
            Arc::new(MetadataClient::new(&MetadataConfig {
                base_url: None,
                timeout_sec: 5,
            })),
            Arc::new(ErrorRouter::new()),
        )
    }

    #[tokio::test]
    async fn empty_id_yields_validation_error_response() {
        let pipeline = test_pipeline();
        let response = pipeline.handle("movie", "").await;
        assert_eq!(response.error_type.as_deref(), Some("VALIDATION_ERROR"));
        assert_eq!(response.cache_max_age, 60);
        assert!(response.streams.is_empty());
    }

    #[tokio::test]
    async fn all_sources_empty_yields_bounded_ttl_empty_response() {
        let pipeline = test_pipeline();
        let response = pipeline.handle("movie", "tt9999991").await;
        assert!(response.streams.is_empty());
        assert!(response.cache_max_age <= 300);
    }

    #[tokio::test]
    async fn repeated_request_is_served_from_response_cache() {
        let pipeline = test_pipeline();
        let first = pipeline.handle("movie", "tt9999991").await;
        let second = pipeline.handle("movie", "tt9999991").await;
        assert_eq!(first.cache_max_age, second.cache_max_age);
    }
}
