//! Loads a tabular (CSV) snapshot of magnet descriptors into an indexed
//! in-memory map, lazily and idempotently, from a local file or a URL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::SnapshotSourceConfig;
use crate::error::AppError;
use crate::magnet::{parse_size_bytes, Feature, MagnetDescriptor, Quality};

#[derive(Debug, serde::Deserialize)]
struct SnapshotRow {
    content_id: String,
    name: String,
    magnet: String,
    quality: String,
    size: String,
    #[serde(default)]
    imdb_id: String,
    #[serde(default)]
    id_type: String,
    #[serde(default)]
    provider: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    seeders: String,
    #[serde(default)]
    peers: String,
    #[serde(default)]
    season: String,
    #[serde(default)]
    episode: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    fansub: String,
}

struct Index {
    descriptors: Vec<MagnetDescriptor>,
    by_content_id: HashMap<String, Vec<usize>>,
    by_legacy_imdb_id: HashMap<String, Vec<usize>>,
}

/// One named snapshot source (primary/secondary/anime/english-fallback), lazily
/// loaded on first query and idempotent across repeated init calls.
pub struct TabularSnapshotStore {
    name: String,
    location: String,
    timeout: Duration,
    index: OnceCell<Arc<Index>>,
}

impl TabularSnapshotStore {
    pub fn new(config: &SnapshotSourceConfig) -> Self {
        Self {
            name: config.name.clone(),
            location: config.location.clone(),
            timeout: Duration::from_secs(config.timeout_sec),
            index: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_loaded(&self) -> Arc<Index> {
        self.index
            .get_or_init(|| async {
                match self.load().await {
                    Ok(index) => Arc::new(index),
                    Err(e) => {
                        tracing::warn!(store = %self.name, error = %e, "snapshot load failed, store will behave as empty");
                        Arc::new(Index {
                            descriptors: Vec::new(),
                            by_content_id: HashMap::new(),
                            by_legacy_imdb_id: HashMap::new(),
                        })
                    }
                }
            })
            .await
            .clone()
    }

    async fn load(&self) -> Result<Index, AppError> {
        let raw = self.read_source().await?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(raw.as_bytes());

        let mut descriptors = Vec::new();
        let mut by_content_id: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_legacy_imdb_id: HashMap<String, Vec<usize>> = HashMap::new();

        for (row_number, record) in reader.deserialize::<SnapshotRow>().enumerate() {
            let row = match record {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!(store = %self.name, row_number, error = %e, "skipping malformed snapshot row");
                    continue;
                }
            };

            let Some(descriptor) = row_to_descriptor(&row) else {
                tracing::warn!(store = %self.name, row_number, content_id = %row.content_id, "skipping row with no usable info hash");
                continue;
            };

            let idx = descriptors.len();
            by_content_id
                .entry(descriptor.content_id.clone())
                .or_default()
                .push(idx);
            if !row.imdb_id.is_empty() && row.imdb_id != descriptor.content_id {
                by_legacy_imdb_id.entry(row.imdb_id.clone()).or_default().push(idx);
            }
            descriptors.push(descriptor);
        }

        Ok(Index {
            descriptors,
            by_content_id,
            by_legacy_imdb_id,
        })
    }

    async fn read_source(&self) -> Result<String, AppError> {
        if self.location.starts_with("http://") || self.location.starts_with("https://") {
            let client = reqwest::Client::builder().timeout(self.timeout).build()?;
            let response = tokio::time::timeout(self.timeout, client.get(&self.location).send())
                .await
                .map_err(|_| AppError::timeout("snapshot_store", "snapshot fetch timed out"))??;
            Ok(response.text().await?)
        } else {
            tokio::fs::read_to_string(&self.location)
                .await
                .map_err(AppError::from)
        }
    }

    /// Looks up descriptors by `content_id` (or the legacy `imdb_id` column),
    /// applying a season/episode filter on whichever side is supplied.
    pub async fn by_content_id(
        &self,
        content_id: &str,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Vec<MagnetDescriptor> {
        let index = self.ensure_loaded().await;

        let mut indices: Vec<usize> = index
            .by_content_id
            .get(content_id)
            .cloned()
            .unwrap_or_default();
        if let Some(legacy) = index.by_legacy_imdb_id.get(content_id) {
            indices.extend(legacy.iter().copied());
        }
        indices.sort_unstable();
        indices.dedup();

        let mut results: Vec<MagnetDescriptor> = indices
            .into_iter()
            .map(|i| index.descriptors[i].clone())
            .collect();

        if season.is_some() || episode.is_some() {
            results.retain(|d| d.matches_episode(season, episode));
        }

        results
    }
}

fn row_to_descriptor(row: &SnapshotRow) -> Option<MagnetDescriptor> {
    let quality = Quality::parse(&row.quality);
    let size_bytes = parse_size_bytes(&row.size);
    let provider = if row.provider.is_empty() {
        "Unknown".to_string()
    } else {
        row.provider.clone()
    };

    let mut descriptor = MagnetDescriptor::try_new(
        row.content_id.clone(),
        row.magnet.clone(),
        row.name.clone(),
        quality,
        size_bytes,
        provider,
    )?;

    descriptor.seeders = parse_optional_u32(&row.seeders);
    descriptor.leechers = parse_optional_u32(&row.peers);
    descriptor.season = parse_optional_u32(&row.season);
    descriptor.episode = parse_optional_u32(&row.episode);
    descriptor.language = non_empty(&row.language);
    descriptor.fansub = non_empty(&row.fansub);
    descriptor.filename = non_empty(&row.filename);
    descriptor.features = row
        .name
        .split(|c: char| !c.is_alphanumeric())
        .filter_map(Feature::parse)
        .collect();

    Some(descriptor)
}

fn parse_optional_u32(s: &str) -> Option<u32> {
    if s.is_empty() {
        None
    } else {
        s.parse().ok()
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
