//! Orchestrates ordered lookup across local snapshot stores and the remote
//! aggregator, with cache-first short-circuiting and source-exhaustion
//! tracking.

pub mod aggregator_client;
pub mod snapshot_store;

pub use aggregator_client::RemoteAggregatorClient;
pub use snapshot_store::TabularSnapshotStore;

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{stream_cache_key, Cache, TtlHint};
use crate::error::AppError;
use crate::error_router::ErrorRouter;
use crate::ids::{IdDetector, IdType};
use crate::magnet::{strip_embedded_episode, MagnetDescriptor};

/// Lookup options carried alongside `contentId`/`type`.
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

const DEFAULT_EXHAUSTED_TTL: Duration = Duration::from_secs(600);

#[derive(Hash, PartialEq, Eq, Clone)]
struct ExhaustionKey {
    source: String,
    base_content_id: String,
    season: Option<u32>,
    episode: Option<u32>,
}

/// Orchestrates the cascading lookup contract: cache → snapshot stores →
/// remote aggregator, deduped and sorted before caching and returning.
pub struct CascadingMagnetRepository {
    cache: Cache,
    id_detector: IdDetector,
    stores: Vec<Arc<TabularSnapshotStore>>,
    aggregator: Arc<RemoteAggregatorClient>,
    error_router: Arc<ErrorRouter>,
    exhausted: DashMap<ExhaustionKey, Instant>,
    exhausted_ttl: Duration,
}

impl CascadingMagnetRepository {
    pub fn new(
        cache: Cache,
        stores: Vec<Arc<TabularSnapshotStore>>,
        aggregator: Arc<RemoteAggregatorClient>,
        error_router: Arc<ErrorRouter>,
    ) -> Self {
        Self {
            cache,
            id_detector: IdDetector::new(),
            stores,
            aggregator,
            error_router,
            exhausted: DashMap::new(),
            exhausted_ttl: DEFAULT_EXHAUSTED_TTL,
        }
    }

    pub fn clear_exhausted_sources_cache(&self) {
        self.exhausted.clear();
    }

    fn is_exhausted(&self, source: &str, base_content_id: &str, options: &LookupOptions) -> bool {
        let key = ExhaustionKey {
            source: source.to_string(),
            base_content_id: base_content_id.to_string(),
            season: options.season,
            episode: options.episode,
        };
        match self.exhausted.get(&key) {
            Some(entry) => entry.elapsed() < self.exhausted_ttl,
            None => false,
        }
    }

    fn mark_exhausted(&self, source: &str, base_content_id: &str, options: &LookupOptions) {
        self.exhausted.insert(
            ExhaustionKey {
                source: source.to_string(),
                base_content_id: base_content_id.to_string(),
                season: options.season,
                episode: options.episode,
            },
            Instant::now(),
        );
    }

    /// `lookup(contentId, type, options) → list<MagnetDescriptor>`, failing
    /// with a `REPOSITORY` error when nothing at all was found.
    pub async fn lookup(
        &self,
        content_id: &str,
        content_type: &str,
        options: LookupOptions,
    ) -> Result<Vec<MagnetDescriptor>, AppError> {
        let detection = self.id_detector.detect(content_id);
        let id_type_label = detection.id_type.to_string();

        let cache_key = stream_cache_key(
            content_type,
            content_id,
            &id_type_label,
            options.season,
            options.episode,
        );
        if let Some(cached) = self.cache.get(&cache_key) {
            if let Ok(descriptors) = serde_json::from_str::<Vec<MagnetDescriptor>>(&cached) {
                return Ok(descriptors);
            }
        }

        let base_content_id = strip_embedded_episode(content_id).to_string();

        let mut merged = Vec::new();
        for store in &self.stores {
            if self.is_exhausted(store.name(), &base_content_id, &options) {
                continue;
            }
            let results = store
                .by_content_id(&base_content_id, options.season, options.episode)
                .await;
            if results.is_empty() {
                self.mark_exhausted(store.name(), &base_content_id, &options);
            } else {
                merged.extend(results);
            }
        }

        if merged.is_empty() {
            let aggregator = self.aggregator.clone();
            let id = base_content_id.clone();
            let content_type_owned = content_type.to_string();
            let fetched = self
                .error_router
                .execute("aggregator.search_by_id", || {
                    let aggregator = aggregator.clone();
                    let id = id.clone();
                    let content_type_owned = content_type_owned.clone();
                    async move { aggregator.search_by_id(&id, &content_type_owned).await }
                })
                .await;

            match fetched {
                Ok(results) => merged.extend(results),
                Err(e) => {
                    tracing::warn!(content_id, error = %e, "aggregator lookup failed, nothing found locally");
                    return Err(e);
                }
            }
        }

        if options.season.is_some() || options.episode.is_some() {
            merged.retain(|d| d.matches_episode(options.season, options.episode));
        }

        let deduped = dedup_by_info_hash(merged);

        if deduped.is_empty() {
            return Err(AppError::not_found(
                "cascading_magnet_repository",
                format!("no magnet descriptors found for {}", content_id),
            ));
        }

        let sorted = sort_by_video_size_desc(deduped);

        let ttl = self.cache.adaptive_ttl(
            self.cache.default_ttl(),
            TtlHint {
                stream_count: sorted.len(),
                is_anime_family: detection.id_type.is_anime_family(),
                is_non_imdb_unknown: detection.id_type == IdType::Unknown,
            },
        );
        if let Ok(serialized) = serde_json::to_string(&sorted) {
            self.cache.set(&cache_key, serialized, ttl, "magnet-descriptors", None);
        }

        Ok(sorted)
    }
}

/// Deduplicates by `infoHash`, keeping the first occurrence (stores are
/// queried in priority order, so earlier entries win).
fn dedup_by_info_hash(descriptors: Vec<MagnetDescriptor>) -> Vec<MagnetDescriptor> {
    let mut seen = std::collections::HashSet::new();
    descriptors
        .into_iter()
        .filter(|d| seen.insert(d.info_hash.clone()))
        .collect()
}

fn sort_by_video_size_desc(mut descriptors: Vec<MagnetDescriptor>) -> Vec<MagnetDescriptor> {
    descriptors.sort_by(|a, b| {
        b.size_bytes
            .cmp(&a.size_bytes)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    descriptors
}
