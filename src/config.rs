//! Configuration for the stream resolver.
//!
//! Loads configuration from `config.toml` with environment variable overrides.

use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::AppError;

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub snapshots: Vec<SnapshotSourceConfig>,
}

/// HTTP server bind configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7000
}

/// Process-local cache parameters, per `Cache`'s contract.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_ttl_sec")]
    pub default_ttl_sec: u64,
    #[serde(default = "default_sweep_period_sec")]
    pub sweep_period_sec: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_memory_mb: default_max_memory_mb(),
            max_entries: default_max_entries(),
            default_ttl_sec: default_ttl_sec(),
            sweep_period_sec: default_sweep_period_sec(),
        }
    }
}

impl CacheConfig {
    pub fn max_bytes(&self) -> u64 {
        self.max_memory_mb * 1024 * 1024
    }
}

fn default_true() -> bool {
    true
}

fn default_max_memory_mb() -> u64 {
    64
}

fn default_max_entries() -> usize {
    1000
}

fn default_ttl_sec() -> u64 {
    1800
}

fn default_sweep_period_sec() -> u64 {
    300
}

/// Scraping-search subsystem parameters (`SearchOrchestrator`).
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout_sec")]
    pub timeout_sec: u64,
    #[serde(default = "default_max_concurrent_searches")]
    pub max_concurrent_searches: usize,
    #[serde(default = "default_search_cache_ttl_sec")]
    pub cache_ttl_sec: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            timeout_sec: default_search_timeout_sec(),
            max_concurrent_searches: default_max_concurrent_searches(),
            cache_ttl_sec: default_search_cache_ttl_sec(),
        }
    }
}

fn default_max_results() -> usize {
    50
}

fn default_search_timeout_sec() -> u64 {
    15
}

fn default_max_concurrent_searches() -> usize {
    3
}

fn default_search_cache_ttl_sec() -> u64 {
    1800
}

/// `RemoteAggregatorClient` configuration.
#[derive(Clone, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_aggregator_base_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_aggregator_timeout_sec")]
    pub timeout_sec: u64,
    #[serde(default = "default_language_priority")]
    pub language_priority: Vec<String>,
}

impl std::fmt::Debug for AggregatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_sec", &self.timeout_sec)
            .field("language_priority", &self.language_priority)
            .finish()
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_aggregator_base_url(),
            api_key: None,
            timeout_sec: default_aggregator_timeout_sec(),
            language_priority: default_language_priority(),
        }
    }
}

fn default_aggregator_base_url() -> String {
    "https://aggregator.invalid".to_string()
}

fn default_aggregator_timeout_sec() -> u64 {
    10
}

fn default_language_priority() -> Vec<String> {
    vec!["es-latino".to_string(), "es".to_string(), "en".to_string()]
}

/// `UnifiedIdService` mapping endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MappingConfig {
    #[serde(default = "default_mapping_base_url")]
    pub base_url: String,
    #[serde(default = "default_mapping_timeout_sec")]
    pub timeout_sec: u64,
    #[serde(default = "default_mapping_retries")]
    pub max_retries: u32,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            base_url: default_mapping_base_url(),
            timeout_sec: default_mapping_timeout_sec(),
            max_retries: default_mapping_retries(),
        }
    }
}

fn default_mapping_base_url() -> String {
    "https://mapping.invalid".to_string()
}

fn default_mapping_timeout_sec() -> u64 {
    5
}

fn default_mapping_retries() -> u32 {
    2
}

/// Optional metadata-enrichment collaborator configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetadataConfig {
    pub base_url: Option<String>,
    #[serde(default = "default_metadata_timeout_sec")]
    pub timeout_sec: u64,
}

fn default_metadata_timeout_sec() -> u64 {
    5
}

/// Per-provider scraping configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_provider_rate_limit")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_provider_timeout_sec")]
    pub timeout_sec: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 0,
            rate_limit_per_minute: default_provider_rate_limit(),
            timeout_sec: default_provider_timeout_sec(),
        }
    }
}

fn default_provider_rate_limit() -> u32 {
    20
}

fn default_provider_timeout_sec() -> u64 {
    15
}

/// One `TabularSnapshotStore` source: a local file path or a remote URL.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotSourceConfig {
    pub name: String,
    pub location: String,
    #[serde(default = "default_snapshot_timeout_sec")]
    pub timeout_sec: u64,
}

fn default_snapshot_timeout_sec() -> u64 {
    20
}

impl Config {
    /// Load configuration from the default `config.toml` plus environment overrides.
    ///
    /// Order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. `config.toml` in the current directory (optional)
    /// 3. Environment variables prefixed `STREAMRES_`, `__`-nested
    pub fn load() -> Result<Self, AppError> {
        Self::load_from("config.toml")
    }

    pub fn load_from(config_path: &str) -> Result<Self, AppError> {
        let raw = ConfigLoader::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("cache.enabled", true)?
            .set_default("cache.max_memory_mb", default_max_memory_mb() as i64)?
            .set_default("cache.max_entries", default_max_entries() as i64)?
            .set_default("cache.default_ttl_sec", default_ttl_sec() as i64)?
            .set_default("cache.sweep_period_sec", default_sweep_period_sec() as i64)?
            .set_default("search.max_results", default_max_results() as i64)?
            .set_default("search.timeout_sec", default_search_timeout_sec() as i64)?
            .set_default(
                "search.max_concurrent_searches",
                default_max_concurrent_searches() as i64,
            )?
            .set_default("search.cache_ttl_sec", default_search_cache_ttl_sec() as i64)?
            .set_default("aggregator.base_url", default_aggregator_base_url())?
            .set_default("aggregator.timeout_sec", default_aggregator_timeout_sec() as i64)?
            .set_default("mapping.base_url", default_mapping_base_url())?
            .set_default("mapping.timeout_sec", default_mapping_timeout_sec() as i64)?
            .set_default("mapping.max_retries", default_mapping_retries() as i64)?
            .add_source(File::with_name(config_path).required(false))
            .add_source(
                Environment::with_prefix("STREAMRES")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = raw.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.aggregator.api_key.is_none() {
            tracing::warn!("aggregator API key not configured - remote aggregator calls may be rejected");
        }
        if self.cache.max_entries == 0 {
            return Err(AppError::configuration(
                "config",
                "cache.max_entries must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> std::net::SocketAddr {
        use std::net::{IpAddr, SocketAddr};
        let ip: IpAddr = self.server.host.parse().unwrap_or_else(|_| {
            tracing::warn!("invalid host '{}', falling back to 0.0.0.0", self.server.host);
            "0.0.0.0".parse().unwrap()
        });
        SocketAddr::new(ip, self.server.port)
    }

    pub fn provider(&self, name: &str) -> ProviderConfig {
        self.providers.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_loads() {
        let config = Config::load_from("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.cache.max_bytes(), 64 * 1024 * 1024);
    }

    #[test]
    fn server_addr_falls_back_to_wildcard() {
        let config = Config::load_from("nonexistent.toml").unwrap();
        let addr = config.server_addr();
        assert_eq!(addr.port(), 7000);
    }

    #[test]
    fn unknown_provider_uses_defaults() {
        let config = Config::load_from("nonexistent.toml").unwrap();
        let p = config.provider("nonexistent");
        assert!(p.enabled);
        assert_eq!(p.rate_limit_per_minute, 20);
    }

    #[test]
    fn default_language_priority_prefers_latino() {
        let config = Config::load_from("nonexistent.toml").unwrap();
        assert_eq!(config.aggregator.language_priority[0], "es-latino");
    }
}
