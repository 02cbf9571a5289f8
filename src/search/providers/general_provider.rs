//! General-purpose scraping provider, backed by an EZTV-style JSON API
//! covering both movies and series without any specialty bias.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::error::AppError;
use crate::magnet::{MagnetDescriptor, Quality};
use crate::search::SearchQuery;

use super::ScrapeProvider;

const DEFAULT_API_URL: &str = "https://eztv.re/api/get-torrents";

pub struct GeneralProvider {
    client: Client,
    api_url: String,
}

impl GeneralProvider {
    pub fn new() -> Self {
        Self::with_api_url(DEFAULT_API_URL.to_string())
    }

    pub fn with_api_url(api_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (streamres)")
            .build()
            .expect("failed to build general provider HTTP client");
        Self { client, api_url }
    }
}

impl Default for GeneralProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScrapeProvider for GeneralProvider {
    fn id(&self) -> &str {
        "general"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MagnetDescriptor>, AppError> {
        let url = if let Some(imdb_id) = &query.imdb_id {
            let imdb_num = imdb_id.trim_start_matches("tt");
            format!("{}?imdb_id={}&limit=50", self.api_url, imdb_num)
        } else {
            format!("{}?limit=50&query={}", self.api_url, urlencoding::encode(&query.term))
        };

        tracing::debug!(url = %url, "searching general provider");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::network(
                "general_provider",
                format!("provider responded with status {}", response.status()),
            ));
        }

        let body: GeneralApiResponse = response.json().await?;
        let torrents = body.torrents.unwrap_or_default();

        let descriptors = torrents
            .into_iter()
            .filter(|t| match (query.season, query.episode) {
                (Some(season), Some(episode)) => {
                    t.season.map(|s| s as u32 == season).unwrap_or(false)
                        && t.episode.map(|e| e as u32 == episode).unwrap_or(false)
                }
                _ => true,
            })
            .filter_map(|t| {
                let quality = infer_quality(&t.title);
                let mut descriptor = MagnetDescriptor::try_new(
                    query.imdb_id.clone().unwrap_or_else(|| t.title.clone()),
                    t.magnet_url,
                    t.title,
                    quality,
                    t.size_bytes.parse().unwrap_or(0),
                    "general".to_string(),
                )?;
                descriptor.seeders = Some(t.seeds);
                descriptor.leechers = Some(t.peers.saturating_sub(t.seeds));
                descriptor.season = t.season.map(|s| s as u32);
                descriptor.episode = t.episode.map(|e| e as u32);
                Some(descriptor)
            })
            .collect();

        Ok(descriptors)
    }
}

fn infer_quality(title: &str) -> Quality {
    let lower = title.to_lowercase();
    for token in ["2160p", "1080p", "720p", "480p", "web-dl", "webrip", "bluray", "dvdrip"] {
        if lower.contains(token) {
            return Quality::parse(token);
        }
    }
    Quality::Unknown
}

#[derive(Debug, Deserialize)]
struct GeneralApiResponse {
    torrents: Option<Vec<GeneralTorrent>>,
}

#[derive(Debug, Deserialize)]
struct GeneralTorrent {
    title: String,
    magnet_url: String,
    size_bytes: String,
    seeds: u32,
    peers: u32,
    season: Option<i32>,
    episode: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_general() {
        assert_eq!(GeneralProvider::new().id(), "general");
    }

    #[test]
    fn infers_quality_from_title_tokens() {
        assert_eq!(infer_quality("Show.S01E02.1080p.WEB-DL"), Quality::P1080);
        assert_eq!(infer_quality("Show.S01E02"), Quality::Unknown);
    }

    #[test]
    fn default_rank_bias_is_neutral() {
        let provider = GeneralProvider::new();
        let d = MagnetDescriptor::try_new(
            "tt1".into(),
            "magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into(),
            "x".into(),
            Quality::P1080,
            0,
            "general".into(),
        )
        .unwrap();
        assert_eq!(provider.rank_bias(&d), 0);
    }
}
