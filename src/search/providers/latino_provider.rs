//! Spanish/Latino-oriented scraping provider. Scrapes an HTML search results
//! page rather than calling a JSON API, and biases its own language toward
//! the top of the merged result set.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;

use crate::error::AppError;
use crate::magnet::{parse_size_bytes, MagnetDescriptor, Quality};
use crate::search::SearchQuery;

use super::ScrapeProvider;

const DEFAULT_BASE_URL: &str = "https://latino-tracker.invalid";

pub struct LatinoProvider {
    client: Client,
    base_url: String,
}

impl LatinoProvider {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (streamres)")
            .build()
            .expect("failed to build latino provider HTTP client");
        Self { client, base_url }
    }

    fn parse_search_results(&self, html: &str) -> Vec<PartialResult> {
        let document = Html::parse_document(html);
        let mut results = Vec::new();

        let row_selector = Selector::parse("table.results tbody tr").unwrap();
        let title_selector = Selector::parse("td.title a").unwrap();
        let size_selector = Selector::parse("td.size").unwrap();
        let seeds_selector = Selector::parse("td.seeds").unwrap();
        let hash_selector = Selector::parse("a.magnet").unwrap();

        for row in document.select(&row_selector) {
            let Some(title_elem) = row.select(&title_selector).next() else {
                continue;
            };
            let title = title_elem.text().collect::<String>().trim().to_string();
            if title.is_empty() {
                continue;
            }

            let Some(magnet) = row
                .select(&hash_selector)
                .next()
                .and_then(|e| e.value().attr("href"))
            else {
                continue;
            };

            let size_text = row
                .select(&size_selector)
                .next()
                .map(|e| e.text().collect::<String>())
                .unwrap_or_default();
            let size_bytes = parse_size_bytes(&size_text);

            let seeders = row
                .select(&seeds_selector)
                .next()
                .map(|e| e.text().collect::<String>().trim().parse().unwrap_or(0))
                .unwrap_or(0);

            results.push(PartialResult {
                title,
                magnet: magnet.to_string(),
                size_bytes,
                seeders,
            });
        }

        results
    }
}

impl Default for LatinoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScrapeProvider for LatinoProvider {
    fn id(&self) -> &str {
        "latino"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MagnetDescriptor>, AppError> {
        let url = format!(
            "{}/buscar?q={}",
            self.base_url,
            urlencoding::encode(&query.term)
        );

        tracing::debug!(url = %url, "searching latino provider");

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "latino provider is unreachable");
                return Ok(Vec::new());
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "latino provider returned non-success status");
            return Ok(Vec::new());
        }

        let html = response.text().await?;
        let partials = self.parse_search_results(&html);

        let descriptors = partials
            .into_iter()
            .filter_map(|p| {
                let quality = infer_quality(&p.title);
                let mut descriptor = MagnetDescriptor::try_new(
                    query.imdb_id.clone().unwrap_or_else(|| p.title.clone()),
                    p.magnet,
                    p.title,
                    quality,
                    p.size_bytes,
                    "latino".to_string(),
                )?;
                descriptor.seeders = Some(p.seeders);
                descriptor.language = Some("es-latino".to_string());
                Some(descriptor)
            })
            .collect();

        Ok(descriptors)
    }

    fn rank_bias(&self, descriptor: &MagnetDescriptor) -> i32 {
        match descriptor.language.as_deref() {
            Some("es-latino") => 15,
            Some("es") => 10,
            _ => 0,
        }
    }
}

fn infer_quality(title: &str) -> Quality {
    let lower = title.to_lowercase();
    for token in ["2160p", "1080p", "720p", "480p", "bluray", "webrip", "dvdrip"] {
        if lower.contains(token) {
            return Quality::parse(token);
        }
    }
    Quality::Unknown
}

struct PartialResult {
    title: String,
    magnet: String,
    size_bytes: u64,
    seeders: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_latino() {
        assert_eq!(LatinoProvider::new().id(), "latino");
    }

    #[test]
    fn rank_bias_favors_latino_over_spanish_over_other() {
        let provider = LatinoProvider::new();
        let mut latino = MagnetDescriptor::try_new(
            "tt1".into(),
            "magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into(),
            "x".into(),
            Quality::P1080,
            0,
            "latino".into(),
        )
        .unwrap();
        latino.language = Some("es-latino".to_string());

        let mut spanish = latino.clone();
        spanish.info_hash = "b".repeat(40);
        spanish.language = Some("es".to_string());

        let mut other = latino.clone();
        other.info_hash = "c".repeat(40);
        other.language = Some("en".to_string());

        assert!(provider.rank_bias(&latino) > provider.rank_bias(&spanish));
        assert!(provider.rank_bias(&spanish) > provider.rank_bias(&other));
    }

    #[test]
    fn parse_search_results_on_empty_html_yields_nothing() {
        let provider = LatinoProvider::new();
        assert!(provider.parse_search_results("<html></html>").is_empty());
    }
}
