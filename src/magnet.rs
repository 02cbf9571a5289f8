//! The `MagnetDescriptor` entity and its quality/size parsing helpers.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

lazy_static! {
    static ref SIZE_RE: Regex = Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(KB|MB|GB|TB)").unwrap();
    static ref INFO_HASH_RE: Regex = Regex::new(r"(?i)btih:([a-f0-9]{40})").unwrap();
}

/// Quality label. Deliberately mixes resolution and source values in one
/// flat vocabulary, matching the single `quality` column snapshots ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "2160p")]
    P2160,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "SD")]
    Sd,
    BluRay,
    WebRip,
    DvdRip,
    Unknown,
}

impl Quality {
    pub fn parse(s: &str) -> Quality {
        match s.trim().to_lowercase().as_str() {
            "2160p" | "4k" | "uhd" => Quality::P2160,
            "1080p" => Quality::P1080,
            "720p" => Quality::P720,
            "480p" => Quality::P480,
            "sd" => Quality::Sd,
            "bluray" | "blu-ray" | "bdrip" | "brrip" => Quality::BluRay,
            "webrip" | "web-dl" | "webdl" | "web" => Quality::WebRip,
            "dvdrip" | "dvd" => Quality::DvdRip,
            _ => Quality::Unknown,
        }
    }

    /// Rank used by the seeders-then-quality ordering alternative.
    pub fn rank(&self) -> u32 {
        match self {
            Quality::P2160 => 4,
            Quality::P1080 => 3,
            Quality::P720 => 2,
            Quality::P480 => 1,
            Quality::BluRay => 3,
            Quality::WebRip => 2,
            Quality::DvdRip => 1,
            Quality::Sd | Quality::Unknown => 0,
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Quality::P2160 => "2160p",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::Sd => "SD",
            Quality::BluRay => "BluRay",
            Quality::WebRip => "WEBRip",
            Quality::DvdRip => "DVDRip",
            Quality::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Visual/audio feature tags carried alongside quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Hdr,
    DolbyVision,
    Atmos,
    Remux,
    Hevc,
}

impl Feature {
    pub fn parse(s: &str) -> Option<Feature> {
        match s.trim().to_uppercase().as_str() {
            "HDR" => Some(Feature::Hdr),
            "DOLBYVISION" | "DV" => Some(Feature::DolbyVision),
            "ATMOS" => Some(Feature::Atmos),
            "REMUX" => Some(Feature::Remux),
            "HEVC" | "X265" | "H265" | "H.265" => Some(Feature::Hevc),
            _ => None,
        }
    }
}

/// The content family a descriptor belongs to, mirrors [`crate::ids::IdType`]'s split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Movie,
    Series,
    Anime,
}

impl ContentType {
    pub fn parse(s: &str) -> Option<ContentType> {
        match s.to_lowercase().as_str() {
            "movie" => Some(ContentType::Movie),
            "series" | "tv" => Some(ContentType::Series),
            "anime" => Some(ContentType::Anime),
            _ => None,
        }
    }
}

/// The core entity: an immutable, deduplicable magnet description.
///
/// `infoHash` is identity — two descriptors with the same hash are
/// duplicates of one another regardless of every other field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagnetDescriptor {
    pub content_id: String,
    pub info_hash: String,
    pub magnet_uri: String,
    pub display_name: String,
    pub quality: Quality,
    pub size_bytes: u64,
    pub seeders: Option<u32>,
    pub leechers: Option<u32>,
    pub provider: String,
    pub language: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub fansub: Option<String>,
    pub filename: Option<String>,
    pub file_index: Option<u32>,
    pub trackers: Vec<String>,
    pub features: HashSet<Feature>,
    pub uploaded_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl MagnetDescriptor {
    /// Builds a descriptor, returning `None` when `magnet_uri` carries no
    /// recognizable info hash — such rows are discarded silently upstream.
    pub fn try_new(
        content_id: String,
        magnet_uri: String,
        display_name: String,
        quality: Quality,
        size_bytes: u64,
        provider: String,
    ) -> Option<Self> {
        let info_hash = extract_info_hash(&magnet_uri)?;
        Some(Self {
            content_id,
            info_hash,
            magnet_uri,
            display_name,
            quality,
            size_bytes,
            seeders: None,
            leechers: None,
            provider,
            language: None,
            season: None,
            episode: None,
            fansub: None,
            filename: None,
            file_index: None,
            trackers: Vec::new(),
            features: HashSet::new(),
            uploaded_at: None,
        })
    }

    /// Restricts `trackers` to the recognized URI schemes, discarding the rest.
    pub fn with_filtered_trackers(mut self, raw_trackers: Vec<String>) -> Self {
        self.trackers = filter_trackers(raw_trackers);
        self
    }

    /// Does this descriptor match the given `season`/`episode` filter?
    ///
    /// A side left `None` is unconstrained; a side carrying `Some` must equal
    /// either the descriptor's own field or the matching half of a `:S:E`
    /// suffix embedded in `content_id`. Supplying only one side filters on
    /// that side alone.
    pub fn matches_episode(&self, season: Option<u32>, episode: Option<u32>) -> bool {
        let embedded = parse_embedded_episode(&self.content_id);
        let own_season = self.season.or_else(|| embedded.map(|(s, _)| s));
        let own_episode = self.episode.or_else(|| embedded.map(|(_, e)| e));

        if let Some(s) = season {
            if own_season != Some(s) {
                return false;
            }
        }
        if let Some(e) = episode {
            if own_episode != Some(e) {
                return false;
            }
        }
        true
    }
}

/// Extracts the 40-hex-char info hash from a `magnet:?xt=urn:btih:...` URI.
pub fn extract_info_hash(magnet_uri: &str) -> Option<String> {
    INFO_HASH_RE
        .captures(magnet_uri)
        .map(|c| c[1].to_lowercase())
}

/// Parses a `:S:E` suffix from a content id, e.g. `tt0903747:3:9` → `(3, 9)`.
pub fn parse_embedded_episode(content_id: &str) -> Option<(u32, u32)> {
    let parts: Vec<&str> = content_id.rsplitn(3, ':').collect();
    if parts.len() == 3 {
        let episode: u32 = parts[0].parse().ok()?;
        let season: u32 = parts[1].parse().ok()?;
        return Some((season, episode));
    }
    None
}

/// Strips a trailing `:S:E` suffix, returning the base content id.
pub fn strip_embedded_episode(content_id: &str) -> &str {
    if parse_embedded_episode(content_id).is_some() {
        let mut parts = content_id.rsplitn(3, ':');
        parts.next(); // episode
        parts.next(); // season
        if let Some(base) = parts.next() {
            return base;
        }
    }
    content_id
}

/// Parses a human-readable size string (`"1.2 GB"`) into bytes.
/// Unmatched input yields 0, per the assembler's size-parsing contract.
pub fn parse_size_bytes(s: &str) -> u64 {
    let Some(caps) = SIZE_RE.captures(s) else {
        return 0;
    };
    let num: f64 = caps[1].parse().unwrap_or(0.0);
    let unit = caps[2].to_uppercase();
    let multiplier: u64 = match unit.as_str() {
        "KB" => 1024,
        "MB" => 1024u64.pow(2),
        "GB" => 1024u64.pow(3),
        "TB" => 1024u64.pow(4),
        _ => 1,
    };
    (num * multiplier as f64) as u64
}

fn filter_trackers(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .filter(|t| {
            t.starts_with("http://") || t.starts_with("https://") || t.starts_with("udp://")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size_strings() {
        assert_eq!(parse_size_bytes("1.2 GB"), (1.2 * 1024f64.powi(3)) as u64);
        assert_eq!(parse_size_bytes("500 MB"), 500 * 1024 * 1024);
        assert_eq!(parse_size_bytes("garbage"), 0);
    }

    #[test]
    fn extracts_info_hash_lowercased() {
        let magnet = "magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA&dn=x";
        assert_eq!(
            extract_info_hash(magnet),
            Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string())
        );
    }

    #[test]
    fn missing_info_hash_yields_none() {
        assert!(MagnetDescriptor::try_new(
            "tt123".into(),
            "magnet:?dn=no-hash".into(),
            "X".into(),
            Quality::Unknown,
            0,
            "p".into(),
        )
        .is_none());
    }

    #[test]
    fn filters_trackers_to_recognized_schemes() {
        let d = MagnetDescriptor::try_new(
            "tt123".into(),
            "magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into(),
            "X".into(),
            Quality::P1080,
            0,
            "p".into(),
        )
        .unwrap()
        .with_filtered_trackers(vec![
            "http://tracker.one/announce".to_string(),
            "ftp://bad.example".to_string(),
            "udp://tracker.two:80".to_string(),
        ]);
        assert_eq!(d.trackers.len(), 2);
    }

    #[test]
    fn parses_embedded_episode_suffix() {
        assert_eq!(parse_embedded_episode("tt0903747:3:9"), Some((3, 9)));
        assert_eq!(parse_embedded_episode("tt0903747"), None);
        assert_eq!(strip_embedded_episode("tt0903747:3:9"), "tt0903747");
    }

    #[test]
    fn strip_embedded_episode_preserves_colon_in_base_id() {
        assert_eq!(strip_embedded_episode("foo:bar:3:9"), "foo:bar");
    }

    #[test]
    fn matches_episode_via_own_fields_or_embedded_suffix() {
        let mut d = MagnetDescriptor::try_new(
            "tt1".into(),
            "magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".into(),
            "x".into(),
            Quality::P1080,
            0,
            "p".into(),
        )
        .unwrap();
        assert!(!d.matches_episode(Some(3), Some(9)));
        d.season = Some(3);
        d.episode = Some(9);
        assert!(d.matches_episode(Some(3), Some(9)));
        assert!(!d.matches_episode(Some(3), Some(10)));

        let embedded = MagnetDescriptor::try_new(
            "tt2:3:9".into(),
            "magnet:?xt=urn:btih:BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB".into(),
            "x".into(),
            Quality::P1080,
            0,
            "p".into(),
        )
        .unwrap();
        assert!(embedded.matches_episode(Some(3), Some(9)));
    }

    #[test]
    fn matches_episode_filters_on_a_single_side_only() {
        let mut d = MagnetDescriptor::try_new(
            "tt3".into(),
            "magnet:?xt=urn:btih:CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC".into(),
            "x".into(),
            Quality::P1080,
            0,
            "p".into(),
        )
        .unwrap();
        d.season = Some(3);
        d.episode = Some(9);

        assert!(d.matches_episode(Some(3), None));
        assert!(!d.matches_episode(Some(4), None));
        assert!(d.matches_episode(None, Some(9)));
        assert!(!d.matches_episode(None, Some(10)));
        assert!(d.matches_episode(None, None));
    }
}
