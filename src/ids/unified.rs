//! Cross-namespace identifier conversion with a memoizing mapping table.

use dashmap::DashMap;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::MappingConfig;
use crate::error::AppError;
use crate::ids::IdType;

#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub success: bool,
    pub converted_id: Option<String>,
    pub method: Option<String>,
    pub error: Option<String>,
}

impl ConversionResult {
    fn identity(id: &str) -> Self {
        Self {
            success: true,
            converted_id: Some(id.to_string()),
            method: Some("identity".to_string()),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            converted_id: None,
            method: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Deserialize)]
struct MappingResponse {
    converted_id: Option<String>,
}

/// Converts identifiers across namespaces (anime ids ↔ imdb) through an
/// external mapping endpoint, memoizing results by `(type, id, targetType)`.
pub struct UnifiedIdService {
    client: Client,
    config: MappingConfig,
    memo: DashMap<(IdType, String, IdType), ConversionResult>,
}

impl UnifiedIdService {
    pub fn new(config: MappingConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec))
            .build()
            .expect("failed to build mapping HTTP client");
        Self {
            client,
            config,
            memo: DashMap::new(),
        }
    }

    /// Converts `id` (of `source_type`) into `target_type`. Never throws;
    /// persistent upstream failure yields `{success:false}`.
    pub async fn convert(&self, id: &str, source_type: IdType, target_type: IdType) -> ConversionResult {
        if source_type == target_type {
            return ConversionResult::identity(id);
        }

        let key = (source_type, id.to_string(), target_type);
        if let Some(cached) = self.memo.get(&key) {
            return cached.clone();
        }

        let result = self.fetch_with_retry(id, source_type, target_type).await;
        self.memo.insert(key, result.clone());
        result
    }

    async fn fetch_with_retry(
        &self,
        id: &str,
        source_type: IdType,
        target_type: IdType,
    ) -> ConversionResult {
        let mut last_error = None;
        for attempt in 1..=self.config.max_retries.max(1) {
            match self.fetch_once(id, source_type, target_type).await {
                Ok(Some(converted)) => {
                    return ConversionResult {
                        success: true,
                        converted_id: Some(converted),
                        method: Some("mapping_service".to_string()),
                        error: None,
                    };
                }
                Ok(None) => {
                    return ConversionResult::failed("mapping service returned no match");
                }
                Err(e) => {
                    tracing::warn!(attempt, %id, %source_type, %target_type, error = %e, "mapping lookup failed");
                    last_error = Some(e.to_string());
                }
            }
        }
        ConversionResult::failed(last_error.unwrap_or_else(|| "mapping lookup exhausted retries".to_string()))
    }

    async fn fetch_once(
        &self,
        id: &str,
        source_type: IdType,
        target_type: IdType,
    ) -> Result<Option<String>, AppError> {
        let url = format!(
            "{}/convert?type={}&id={}&target={}",
            self.config.base_url, source_type, id, target_type
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::network(
                "unified_id_service",
                format!("mapping service status {}", response.status()),
            ));
        }
        let body: MappingResponse = response.json().await?;
        Ok(body.converted_id)
    }
}
