//! 4K/UHD-focused scraping provider, backed by a YTS-style JSON movie API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::error::AppError;
use crate::magnet::{MagnetDescriptor, Quality};
use crate::search::SearchQuery;

use super::ScrapeProvider;

const DEFAULT_BASE_URL: &str = "https://yts.mx/api/v2/list_movies.json";

/// Searches a YTS-style movie API and keeps only releases at or above 1080p,
/// biasing 2160p releases to the top of the merged result set.
pub struct FourKProvider {
    client: Client,
    api_url: String,
}

impl FourKProvider {
    pub fn new() -> Self {
        Self::with_api_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn with_api_url(api_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (streamres)")
            .build()
            .expect("failed to build 4K provider HTTP client");
        Self { client, api_url }
    }

    fn build_magnet(hash: &str, name: &str) -> String {
        let encoded_name = urlencoding::encode(name);
        format!(
            "magnet:?xt=urn:btih:{}&dn={}&tr=udp://open.demonii.com:1337/announce&tr=udp://tracker.opentrackr.org:1337/announce",
            hash, encoded_name
        )
    }
}

impl Default for FourKProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScrapeProvider for FourKProvider {
    fn id(&self) -> &str {
        "fourk"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MagnetDescriptor>, AppError> {
        let mut url = format!("{}?limit=50&sort_by=quality", self.api_url);
        if !query.term.is_empty() {
            url.push_str(&format!("&query_term={}", urlencoding::encode(&query.term)));
        }
        if let Some(year) = query.year {
            url.push_str(&format!("&year={}", year));
        }

        tracing::debug!(url = %url, "searching fourk provider");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::network(
                "fourk_provider",
                format!("provider responded with status {}", response.status()),
            ));
        }

        let body: FourKApiResponse = response.json().await?;
        let movies = body.data.movies.unwrap_or_default();

        let descriptors = movies
            .into_iter()
            .flat_map(|movie| {
                let title = movie.title.clone();
                let year = movie.year;
                movie.torrents.into_iter().filter_map(move |torrent| {
                    let quality = Quality::parse(&torrent.quality);
                    if !matches!(quality, Quality::P2160 | Quality::P1080) {
                        return None;
                    }
                    let name = format!("{}.{}.{}", title.replace(' ', "."), year, torrent.quality);
                    let magnet = Self::build_magnet(&torrent.hash, &name);
                    let mut descriptor = MagnetDescriptor::try_new(
                        query_content_id(&title),
                        magnet,
                        name,
                        quality,
                        torrent.size_bytes,
                        "fourk".to_string(),
                    )?;
                    descriptor.seeders = Some(torrent.seeds);
                    descriptor.leechers = Some(torrent.peers);
                    Some(descriptor)
                })
            })
            .collect();

        Ok(descriptors)
    }

    fn rank_bias(&self, descriptor: &MagnetDescriptor) -> i32 {
        if descriptor.quality == Quality::P2160 {
            20
        } else {
            0
        }
    }
}

fn query_content_id(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}

#[derive(Debug, Deserialize)]
struct FourKApiResponse {
    data: FourKData,
}

#[derive(Debug, Deserialize)]
struct FourKData {
    movies: Option<Vec<FourKMovie>>,
}

#[derive(Debug, Clone, Deserialize)]
struct FourKMovie {
    title: String,
    year: i32,
    torrents: Vec<FourKTorrent>,
}

#[derive(Debug, Clone, Deserialize)]
struct FourKTorrent {
    hash: String,
    quality: String,
    size_bytes: u64,
    seeds: u32,
    peers: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_fourk() {
        assert_eq!(FourKProvider::new().id(), "fourk");
    }

    #[test]
    fn rank_bias_favors_2160p() {
        let provider = FourKProvider::new();
        let d2160 = MagnetDescriptor::try_new(
            "tt1".into(),
            "magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into(),
            "x".into(),
            Quality::P2160,
            0,
            "fourk".into(),
        )
        .unwrap();
        let d1080 = MagnetDescriptor::try_new(
            "tt1".into(),
            "magnet:?xt=urn:btih:BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB".into(),
            "x".into(),
            Quality::P1080,
            0,
            "fourk".into(),
        )
        .unwrap();
        assert!(provider.rank_bias(&d2160) > provider.rank_bias(&d1080));
    }

    #[test]
    fn build_magnet_embeds_hash_and_encoded_name() {
        let magnet = FourKProvider::build_magnet("ABC123", "Some Movie 2160p");
        assert!(magnet.starts_with("magnet:?xt=urn:btih:ABC123"));
        assert!(magnet.contains("dn=Some%20Movie%202160p"));
    }
}
