//! Parallel fan-out to scraping providers: rate limiting, timeout,
//! dedup/sort/truncate, result caching.

pub mod providers;
pub mod rate_limiter;

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::Cache;
use crate::config::{Config, ProviderConfig};
use crate::magnet::MagnetDescriptor;
use providers::ScrapeProvider;
use rate_limiter::ProviderRateLimiters;

/// Canonical search query, also used to derive the result cache key.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub term: String,
    pub content_type: Option<String>,
    pub imdb_id: Option<String>,
    pub year: Option<i32>,
    pub quality: Option<String>,
    pub language: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl SearchQuery {
    /// Stable string derived from all normalized fields, used for cache identity.
    pub fn canonical_key(&self) -> String {
        format!(
            "search:{}:{}:{}:{}:{}:{}:{}:{}",
            self.term.to_lowercase().trim(),
            self.content_type.as_deref().unwrap_or(""),
            self.imdb_id.as_deref().unwrap_or(""),
            self.year.map(|y| y.to_string()).unwrap_or_default(),
            self.quality.as_deref().unwrap_or(""),
            self.language.as_deref().unwrap_or(""),
            self.season.map(|s| s.to_string()).unwrap_or_default(),
            self.episode.map(|e| e.to_string()).unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderOutcomeStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderAvailability {
    pub provider_id: String,
    pub enabled: bool,
    pub priority: i32,
    pub rate_limit_per_minute: u32,
    pub timeout_sec: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderOutcome {
    pub provider_id: String,
    pub result_count: usize,
    pub status: ProviderOutcomeStatus,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Quality,
    Seeders,
    Size,
    Date,
}

impl SortBy {
    pub fn parse(s: &str) -> SortBy {
        match s.to_lowercase().as_str() {
            "seeders" => SortBy::Seeders,
            "size" => SortBy::Size,
            "date" => SortBy::Date,
            _ => SortBy::Quality,
        }
    }
}

pub struct SearchOptions {
    pub providers: Option<Vec<String>>,
    pub skip_cache: bool,
    pub sort_by: SortBy,
    pub max_results: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            providers: None,
            skip_cache: false,
            sort_by: SortBy::Quality,
            max_results: None,
        }
    }
}

pub struct SearchOutcome {
    pub results: Vec<MagnetDescriptor>,
    pub provider_stats: Vec<ProviderOutcome>,
    pub from_cache: bool,
}

const HARD_MAX_RESULTS: usize = 100;

/// Fans out a query to the enabled scraping providers (capped at
/// `maxConcurrentSearches`), merges/dedups/sorts/truncates the results, and
/// caches the merged set.
pub struct SearchOrchestrator {
    providers: Vec<Arc<dyn ScrapeProvider>>,
    rate_limiters: ProviderRateLimiters,
    cache: Cache,
    max_concurrent_searches: usize,
    default_max_results: usize,
    cache_ttl: Duration,
    provider_configs: std::collections::HashMap<String, ProviderConfig>,
}

impl SearchOrchestrator {
    pub fn new(providers: Vec<Arc<dyn ScrapeProvider>>, cache: Cache, config: &Config) -> Self {
        Self {
            providers,
            rate_limiters: ProviderRateLimiters::new(),
            cache,
            max_concurrent_searches: config.search.max_concurrent_searches,
            default_max_results: config.search.max_results,
            cache_ttl: Duration::from_secs(config.search.cache_ttl_sec),
            provider_configs: config.providers.clone(),
        }
    }

    fn provider_config(&self, id: &str) -> ProviderConfig {
        self.provider_configs.get(id).cloned().unwrap_or_default()
    }

    pub async fn search(&self, query: SearchQuery, options: SearchOptions) -> SearchOutcome {
        let cache_key = format!("{}:{:?}", query.canonical_key(), options.providers);

        if !options.skip_cache {
            if let Some(cached) = self.cache.get(&cache_key) {
                if let Ok(results) = serde_json::from_str::<Vec<MagnetDescriptor>>(&cached) {
                    return SearchOutcome {
                        results,
                        provider_stats: Vec::new(),
                        from_cache: true,
                    };
                }
            }
        }

        let selected = self.select_providers(&options.providers);
        let rate_limiters = &self.rate_limiters;

        let mut futures = Vec::with_capacity(selected.len());
        for provider in selected {
            let query = query.clone();
            let provider_cfg = self.provider_config(provider.id());
            let provider = provider.clone();
            futures.push(async move {
                rate_limiters
                    .wait(provider.id(), provider_cfg.rate_limit_per_minute)
                    .await;
                let start = Instant::now();
                let timeout = Duration::from_secs(provider_cfg.timeout_sec);
                let outcome = tokio::time::timeout(timeout, provider.search(&query)).await;
                let elapsed = start.elapsed().as_millis() as u64;

                match outcome {
                    Ok(Ok(results)) => {
                        let stat = ProviderOutcome {
                            provider_id: provider.id().to_string(),
                            result_count: results.len(),
                            status: ProviderOutcomeStatus::Success,
                            response_time_ms: elapsed,
                            error: None,
                        };
                        (stat, Some(provider), results)
                    }
                    Ok(Err(e)) => {
                        let stat = ProviderOutcome {
                            provider_id: provider.id().to_string(),
                            result_count: 0,
                            status: ProviderOutcomeStatus::Error,
                            response_time_ms: elapsed,
                            error: Some(e.to_string()),
                        };
                        (stat, None, Vec::new())
                    }
                    Err(_) => {
                        let stat = ProviderOutcome {
                            provider_id: provider.id().to_string(),
                            result_count: 0,
                            status: ProviderOutcomeStatus::Error,
                            response_time_ms: elapsed,
                            error: Some("timed out".to_string()),
                        };
                        (stat, None, Vec::new())
                    }
                }
            });
        }

        let outcomes: Vec<_> = join_all(futures).await;

        let mut merged = Vec::new();
        let mut stats = Vec::new();
        for (stat, provider, results) in outcomes {
            stats.push(stat);
            if let Some(provider) = provider {
                merged.extend(results.into_iter().map(|d| (provider.clone(), d)));
            }
        }

        let deduped = dedup(merged);
        let mut sorted = sort_results(deduped, options.sort_by);

        let cap = options
            .max_results
            .unwrap_or(self.default_max_results)
            .min(HARD_MAX_RESULTS);
        sorted.truncate(cap);

        if let Ok(serialized) = serde_json::to_string(&sorted) {
            self.cache
                .set(&cache_key, serialized, self.cache_ttl, "search-results", None);
        }

        SearchOutcome {
            results: sorted,
            provider_stats: stats,
            from_cache: false,
        }
    }

    /// Per-provider availability snapshot, used by `GET /api/providers/stats`.
    pub fn provider_stats_snapshot(&self) -> Vec<ProviderAvailability> {
        self.providers
            .iter()
            .map(|p| {
                let cfg = self.provider_config(p.id());
                ProviderAvailability {
                    provider_id: p.id().to_string(),
                    enabled: cfg.enabled,
                    priority: cfg.priority,
                    rate_limit_per_minute: cfg.rate_limit_per_minute,
                    timeout_sec: cfg.timeout_sec,
                }
            })
            .collect()
    }

    fn select_providers(&self, requested: &Option<Vec<String>>) -> Vec<Arc<dyn ScrapeProvider>> {
        let candidates: Vec<Arc<dyn ScrapeProvider>> = match requested {
            Some(ids) => self
                .providers
                .iter()
                .filter(|p| ids.iter().any(|id| id == p.id()))
                .cloned()
                .collect(),
            None => self
                .providers
                .iter()
                .filter(|p| self.provider_config(p.id()).enabled)
                .cloned()
                .collect(),
        };

        candidates
            .into_iter()
            .take(self.max_concurrent_searches)
            .collect()
    }
}

/// Dedup by `infoHash` when present, else by `{title, size}`. First-wins.
fn dedup(items: Vec<(Arc<dyn ScrapeProvider>, MagnetDescriptor)>) -> Vec<(Arc<dyn ScrapeProvider>, MagnetDescriptor)> {
    let mut seen: HashSet<String> = HashSet::new();
    items
        .into_iter()
        .filter(|(_, d)| {
            let key = if !d.info_hash.is_empty() {
                d.info_hash.clone()
            } else {
                format!("{}:{}", d.display_name, d.size_bytes)
            };
            seen.insert(key)
        })
        .collect()
}

fn sort_results(
    items: Vec<(Arc<dyn ScrapeProvider>, MagnetDescriptor)>,
    sort_by: SortBy,
) -> Vec<MagnetDescriptor> {
    let mut items = items;
    items.sort_by(|(provider_a, a), (provider_b, b)| {
        let bias = provider_b.rank_bias(b).cmp(&provider_a.rank_bias(a));
        if bias != std::cmp::Ordering::Equal {
            return bias;
        }
        match sort_by {
            SortBy::Quality => b.quality.rank().cmp(&a.quality.rank()),
            SortBy::Seeders => b.seeders.unwrap_or(0).cmp(&a.seeders.unwrap_or(0)),
            SortBy::Size => b.size_bytes.cmp(&a.size_bytes),
            SortBy::Date => b.uploaded_at.cmp(&a.uploaded_at),
        }
        .then_with(|| provider_a.id().cmp(provider_b.id()))
    });
    items.into_iter().map(|(_, d)| d).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_normalizes_case_and_whitespace() {
        let a = SearchQuery {
            term: " The Matrix ".to_string(),
            ..Default::default()
        };
        let b = SearchQuery {
            term: "the matrix".to_string(),
            ..Default::default()
        };
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn sort_by_parses_known_criteria() {
        assert_eq!(SortBy::parse("seeders"), SortBy::Seeders);
        assert_eq!(SortBy::parse("size"), SortBy::Size);
        assert_eq!(SortBy::parse("date"), SortBy::Date);
        assert_eq!(SortBy::parse("quality"), SortBy::Quality);
        assert_eq!(SortBy::parse("garbage"), SortBy::Quality);
    }
}
