//! Calls the external magnet aggregator with a language-priority fallback
//! chain and projects its JSON response into [`MagnetDescriptor`] values.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::AggregatorConfig;
use crate::error::AppError;
use crate::magnet::{parse_size_bytes, MagnetDescriptor, Quality};

#[derive(Debug, Deserialize)]
struct AggregatorResponse {
    #[serde(default)]
    streams: Vec<AggregatorStream>,
}

#[derive(Debug, Deserialize)]
struct AggregatorStream {
    #[serde(rename = "infoHash")]
    info_hash: Option<String>,
    title: Option<String>,
    magnet: Option<String>,
    quality: Option<String>,
    size: Option<String>,
    seeders: Option<u32>,
    provider: Option<String>,
}

/// Calls the remote magnet aggregator, trying each language in priority
/// order and falling back to `en` before giving up.
pub struct RemoteAggregatorClient {
    client: Client,
    config: AggregatorConfig,
}

impl RemoteAggregatorClient {
    pub fn new(config: AggregatorConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec))
            .build()
            .expect("failed to build aggregator HTTP client");
        Self { client, config }
    }

    /// Builds the attempt chain: the configured priority list, then `en` if
    /// not already present.
    fn language_chain(&self) -> Vec<String> {
        let mut chain = self.config.language_priority.clone();
        if !chain.iter().any(|l| l == "en") {
            chain.push("en".to_string());
        }
        chain
    }

    pub async fn search_by_id(
        &self,
        content_id: &str,
        content_type: &str,
    ) -> Result<Vec<MagnetDescriptor>, AppError> {
        let mut last_error = None;

        for language in self.language_chain() {
            match self.try_language(content_id, content_type, &language).await {
                Ok(descriptors) if !descriptors.is_empty() => return Ok(descriptors),
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(content_id, %language, error = %e, "aggregator request failed for language");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    async fn try_language(
        &self,
        content_id: &str,
        content_type: &str,
        language: &str,
    ) -> Result<Vec<MagnetDescriptor>, AppError> {
        let url = format!(
            "{}/streams/{}/{}?lang={}",
            self.config.base_url, content_type, content_id, language
        );

        let mut request = self.client.get(&url);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AppError::network(
                "remote_aggregator_client",
                format!("aggregator responded with status {}", response.status()),
            ));
        }

        let body: AggregatorResponse = response.json().await?;
        let descriptors = body
            .streams
            .into_iter()
            .filter_map(|s| stream_to_descriptor(s, content_id, language))
            .collect();

        Ok(descriptors)
    }
}

fn stream_to_descriptor(
    stream: AggregatorStream,
    content_id: &str,
    language: &str,
) -> Option<MagnetDescriptor> {
    let magnet_uri = stream.magnet.or_else(|| {
        stream
            .info_hash
            .as_ref()
            .map(|hash| format!("magnet:?xt=urn:btih:{}", hash))
    })?;

    let quality = stream
        .quality
        .as_deref()
        .map(Quality::parse)
        .unwrap_or(Quality::Unknown);
    let size_bytes = stream.size.as_deref().map(parse_size_bytes).unwrap_or(0);
    let provider = stream.provider.unwrap_or_else(|| "aggregator".to_string());

    let mut descriptor = MagnetDescriptor::try_new(
        content_id.to_string(),
        magnet_uri,
        stream.title.unwrap_or_default(),
        quality,
        size_bytes,
        provider,
    )?;
    descriptor.seeders = stream.seeders;
    descriptor.language = Some(language.to_string());
    Some(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_chain_appends_english_fallback() {
        let client = RemoteAggregatorClient::new(AggregatorConfig {
            base_url: "http://x".to_string(),
            api_key: None,
            timeout_sec: 5,
            language_priority: vec!["es-latino".to_string(), "es".to_string()],
        });
        let chain = client.language_chain();
        assert_eq!(chain, vec!["es-latino", "es", "en"]);
    }

    #[test]
    fn language_chain_does_not_duplicate_english() {
        let client = RemoteAggregatorClient::new(AggregatorConfig {
            base_url: "http://x".to_string(),
            api_key: None,
            timeout_sec: 5,
            language_priority: vec!["en".to_string()],
        });
        assert_eq!(client.language_chain(), vec!["en"]);
    }

    #[test]
    fn stream_without_magnet_or_hash_is_dropped() {
        let stream = AggregatorStream {
            info_hash: None,
            title: Some("X".to_string()),
            magnet: None,
            quality: None,
            size: None,
            seeders: None,
            provider: None,
        };
        assert!(stream_to_descriptor(stream, "tt1", "en").is_none());
    }

    #[test]
    fn stream_with_info_hash_only_builds_magnet() {
        let stream = AggregatorStream {
            info_hash: Some("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string()),
            title: Some("X".to_string()),
            magnet: None,
            quality: Some("2160p".to_string()),
            size: Some("4.0 GB".to_string()),
            seeders: Some(10),
            provider: Some("agg".to_string()),
        };
        let descriptor = stream_to_descriptor(stream, "tt1", "es").unwrap();
        assert_eq!(descriptor.quality, Quality::P2160);
        assert_eq!(descriptor.language.as_deref(), Some("es"));
    }
}
