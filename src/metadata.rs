//! Optional metadata-enrichment collaborator: given a content id, returns a
//! best-effort `{title?, year?, type?}` used to decorate stream descriptions.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::MetadataConfig;
use crate::error::AppError;
use crate::stream_assembler::EnrichmentMetadata;

#[derive(Debug, Deserialize)]
struct MetadataApiResponse {
    title: Option<String>,
    year: Option<i32>,
}

/// Calls the external metadata service, when configured. Absent
/// configuration is not an error — enrichment is always optional.
pub struct MetadataClient {
    client: Client,
    base_url: Option<String>,
}

impl MetadataClient {
    pub fn new(config: &MetadataConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec))
            .build()
            .expect("failed to build metadata HTTP client");
        Self {
            client,
            base_url: config.base_url.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    pub async fn lookup(&self, content_id: &str) -> Result<EnrichmentMetadata, AppError> {
        let Some(base_url) = &self.base_url else {
            return Ok(EnrichmentMetadata::default());
        };

        let url = format!("{}/meta/{}", base_url, content_id);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::network(
                "metadata_client",
                format!("metadata service responded with status {}", response.status()),
            ));
        }

        let body: MetadataApiResponse = response.json().await?;
        Ok(EnrichmentMetadata {
            title: body.title,
            year: body.year,
        })
    }
}
