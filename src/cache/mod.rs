//! Process-local key/value cache with adaptive TTL, LRU eviction and a byte
//! budget, backed by a sharded concurrent map.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::config::CacheConfig;

/// A cached value, tagged with the metadata needed for adaptive TTL and
/// diagnostics. The cache itself is value-agnostic: callers serialize
/// whatever they need into `payload`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: String,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub last_access_at: Instant,
    pub approximate_byte_size: u64,
    pub content_type: String,
    pub metadata: Option<String>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Parameters used by [`Cache::adaptive_ttl`] to compute a result-shaped TTL.
#[derive(Debug, Clone, Copy, Default)]
pub struct TtlHint {
    pub stream_count: usize,
    pub is_anime_family: bool,
    pub is_non_imdb_unknown: bool,
}

fn approximate_size(payload: &str) -> u64 {
    // 2 bytes/char for strings plus a small fixed per-entry overhead, per
    // the byte-accounting rule used throughout the cache.
    (payload.chars().count() as u64) * 2 + 48
}

#[derive(Debug, Serialize, Default, Clone, Copy)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes_used: u64,
    pub hits: u64,
    pub misses: u64,
}

struct Inner {
    map: DashMap<String, CacheEntry>,
    bytes_used: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    config: CacheConfig,
}

/// Process-wide cache singleton. Construct via [`Cache::new`] (for
/// production, spawning the sweep task) or [`Cache::new_without_sweep`] (for
/// tests that want deterministic control over eviction).
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Inner>,
    sweep_handle: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        let cache = Self::new_without_sweep(config);
        cache.spawn_sweep();
        cache
    }

    pub fn new_without_sweep(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                map: DashMap::new(),
                bytes_used: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                config,
            }),
            sweep_handle: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    fn spawn_sweep(&self) {
        let inner = self.inner.clone();
        let period = Duration::from_secs(inner.config.sweep_period_sec.max(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                sweep_once(&inner);
            }
        });
        *self.sweep_handle.lock().unwrap() = Some(handle);
    }

    /// Stops the background sweep timer. Idempotent.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweep_handle.lock().unwrap().take() {
            handle.abort();
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(mut entry) = self.inner.map.get_mut(key) {
            if entry.is_expired(now) {
                drop(entry);
                self.delete(key);
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            entry.last_access_at = now;
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.payload.clone());
        }
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        match self.inner.map.get(key) {
            Some(entry) if entry.is_expired(now) => {
                drop(entry);
                self.delete(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn set(&self, key: &str, payload: String, ttl: Duration, content_type: &str, metadata: Option<String>) {
        let now = Instant::now();
        let size = approximate_size(&payload);

        self.delete(key);

        let max_bytes = self.inner.config.max_bytes();
        let projected = self.inner.bytes_used.load(Ordering::Relaxed) + size;
        if projected > max_bytes {
            self.evict_until_below(((max_bytes as f64) * 0.8) as u64);
        }

        if self.inner.map.len() >= self.inner.config.max_entries {
            self.evict_lru_one();
        }

        let entry = CacheEntry {
            payload,
            created_at: now,
            expires_at: now + ttl,
            last_access_at: now,
            approximate_byte_size: size,
            content_type: content_type.to_string(),
            metadata,
        };

        self.inner.bytes_used.fetch_add(size, Ordering::Relaxed);
        self.inner.map.insert(key.to_string(), entry);
    }

    pub fn delete(&self, key: &str) {
        if let Some((_, entry)) = self.inner.map.remove(key) {
            self.inner
                .bytes_used
                .fetch_sub(entry.approximate_byte_size, Ordering::Relaxed);
        }
    }

    pub fn clear(&self) {
        self.inner.map.clear();
        self.inner.bytes_used.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.inner.map.len(),
            bytes_used: self.inner.bytes_used.load(Ordering::Relaxed),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }

    /// Forces an expiry + pressure sweep, used by `POST /api/cache/clean`.
    pub fn force_sweep(&self) {
        sweep_once(&self.inner);
    }

    fn evict_until_below(&self, target_bytes: u64) {
        while self.inner.bytes_used.load(Ordering::Relaxed) > target_bytes {
            if !self.evict_lru_one() {
                break;
            }
        }
    }

    /// Evicts the single entry with the oldest `last_access_at`. Returns
    /// `false` when the cache is already empty.
    fn evict_lru_one(&self) -> bool {
        let oldest_key = self
            .inner
            .map
            .iter()
            .min_by_key(|entry| entry.last_access_at)
            .map(|entry| entry.key().clone());

        match oldest_key {
            Some(key) => {
                self.delete(&key);
                true
            }
            None => false,
        }
    }

    /// Computes a TTL per the adaptive rules, starting from `base`.
    pub fn adaptive_ttl(&self, base: Duration, hint: TtlHint) -> Duration {
        let mut ttl = base;

        if hint.stream_count == 0 {
            ttl = ttl.min(Duration::from_secs(300));
        }
        if hint.stream_count > 10 {
            ttl = ttl.max(Duration::from_secs(1800));
        }
        if hint.is_anime_family {
            ttl = Duration::from_secs_f64(ttl.as_secs_f64() * 1.5);
        }
        if hint.is_non_imdb_unknown {
            ttl = Duration::from_secs_f64(ttl.as_secs_f64() * 0.5);
        }

        ttl
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.inner.config.default_ttl_sec)
    }
}

fn sweep_once(inner: &Inner) {
    let now = Instant::now();
    let expired: Vec<String> = inner
        .map
        .iter()
        .filter(|e| e.is_expired(now))
        .map(|e| e.key().clone())
        .collect();

    for key in &expired {
        if let Some((_, entry)) = inner.map.remove(key) {
            inner
                .bytes_used
                .fetch_sub(entry.approximate_byte_size, Ordering::Relaxed);
        }
    }

    let max_bytes = inner.config.max_bytes();
    let used = inner.bytes_used.load(Ordering::Relaxed);
    if max_bytes > 0 && used as f64 > max_bytes as f64 * 0.9 {
        let evict_count = (inner.map.len() / 10).max(1);
        let mut entries: Vec<(String, Instant)> = inner
            .map
            .iter()
            .map(|e| (e.key().clone(), e.last_access_at))
            .collect();
        entries.sort_by_key(|(_, last_access)| *last_access);
        for (key, _) in entries.into_iter().take(evict_count) {
            if let Some((_, entry)) = inner.map.remove(&key) {
                inner
                    .bytes_used
                    .fetch_sub(entry.approximate_byte_size, Ordering::Relaxed);
            }
        }
    }
}

/// Builds the cache key for a stream lookup: `stream:{type}:{contentId}:{idType}[:s{S}e{E}]`.
pub fn stream_cache_key(
    content_type: &str,
    content_id: &str,
    id_type: &str,
    season: Option<u32>,
    episode: Option<u32>,
) -> String {
    let mut key = format!("stream:{}:{}:{}", content_type, content_id, id_type);
    if let (Some(s), Some(e)) = (season, episode) {
        key.push_str(&format!(":s{}e{}", s, e));
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CacheConfig {
        CacheConfig {
            enabled: true,
            max_memory_mb: 1,
            max_entries: 3,
            default_ttl_sec: 1800,
            sweep_period_sec: 300,
        }
    }

    #[test]
    fn set_then_get_within_ttl_returns_value() {
        let cache = Cache::new_without_sweep(test_config());
        cache.set("k", "v".into(), Duration::from_secs(60), "text", None);
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn get_after_ttl_expiry_is_a_miss() {
        let cache = Cache::new_without_sweep(test_config());
        cache.set("k", "v".into(), Duration::from_millis(0), "text", None);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn entry_count_budget_is_respected() {
        let cache = Cache::new_without_sweep(test_config());
        for i in 0..5 {
            cache.set(
                &format!("k{}", i),
                "v".into(),
                Duration::from_secs(60),
                "text",
                None,
            );
        }
        assert!(cache.stats().entries <= 3);
    }

    #[test]
    fn lru_evicts_oldest_access_first() {
        let cache = Cache::new_without_sweep(test_config());
        cache.set("a", "v".into(), Duration::from_secs(60), "text", None);
        std::thread::sleep(Duration::from_millis(2));
        cache.set("b", "v".into(), Duration::from_secs(60), "text", None);
        // touch b so a becomes the oldest
        cache.get("b");
        std::thread::sleep(Duration::from_millis(2));
        cache.set("c", "v".into(), Duration::from_secs(60), "text", None);
        std::thread::sleep(Duration::from_millis(2));
        cache.set("d", "v".into(), Duration::from_secs(60), "text", None);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn has_evicts_expired_entries() {
        let cache = Cache::new_without_sweep(test_config());
        cache.set("k", "v".into(), Duration::from_millis(0), "text", None);
        std::thread::sleep(Duration::from_millis(5));
        assert!(!cache.has("k"));
    }

    #[test]
    fn adaptive_ttl_shrinks_for_empty_results() {
        let cache = Cache::new_without_sweep(test_config());
        let ttl = cache.adaptive_ttl(
            Duration::from_secs(1800),
            TtlHint {
                stream_count: 0,
                ..Default::default()
            },
        );
        assert!(ttl <= Duration::from_secs(300));
    }

    #[test]
    fn adaptive_ttl_extends_for_anime_family() {
        let cache = Cache::new_without_sweep(test_config());
        let base = Duration::from_secs(1800);
        let ttl = cache.adaptive_ttl(
            base,
            TtlHint {
                is_anime_family: true,
                ..Default::default()
            },
        );
        assert_eq!(ttl, Duration::from_secs_f64(base.as_secs_f64() * 1.5));
    }

    #[test]
    fn stream_cache_key_includes_episode_suffix() {
        let key = stream_cache_key("series", "tt0903747", "imdb-series", Some(3), Some(9));
        assert_eq!(key, "stream:series:tt0903747:imdb-series:s3e9");
    }

    #[test]
    fn stream_cache_key_without_episode_has_no_suffix() {
        let key = stream_cache_key("movie", "tt0133093", "imdb", None, None);
        assert_eq!(key, "stream:movie:tt0133093:imdb");
    }
}
