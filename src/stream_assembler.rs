//! Transforms [`MagnetDescriptor`] values into the addon's wire-level stream
//! records: title/description composition, tracker-source prefixing, and the
//! final deterministic ordering.

use serde::{Deserialize, Serialize};

use crate::ids::IdDetection;
use crate::magnet::MagnetDescriptor;

/// Optional metadata-enrichment result, per the metadata service's contract.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentMetadata {
    pub title: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BehaviorHints {
    #[serde(rename = "bingeGroup")]
    pub binge_group: String,
    #[serde(rename = "videoSize", skip_serializing_if = "Option::is_none")]
    pub video_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(rename = "countryWhitelist", skip_serializing_if = "Option::is_none")]
    pub country_whitelist: Option<Vec<String>>,
}

/// One entry in a `StreamResponse.streams` array. Field names mirror the
/// bit-exact wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRecord {
    pub name: String,
    pub description: String,
    #[serde(rename = "infoHash")]
    pub info_hash: String,
    pub sources: Vec<String>,
    #[serde(rename = "fileIdx", skip_serializing_if = "Option::is_none")]
    pub file_idx: Option<u32>,
    #[serde(rename = "behaviorHints")]
    pub behavior_hints: BehaviorHints,
}

const MAX_FILENAME_LEN: usize = 60;

/// Assembles a sorted list of stream records from magnet descriptors.
/// Descriptors with an absent `infoHash` never reach this function (already
/// enforced by [`MagnetDescriptor::try_new`]); this layer's own contract is
/// to reject any upstream value whose `info_hash` is empty regardless.
pub fn assemble(
    descriptors: Vec<MagnetDescriptor>,
    metadata: Option<&EnrichmentMetadata>,
    detection: Option<&IdDetection>,
) -> Vec<StreamRecord> {
    let mut records: Vec<StreamRecord> = descriptors
        .into_iter()
        .filter(|d| !d.info_hash.is_empty())
        .map(|d| to_record(&d, metadata, detection))
        .collect();

    records.sort_by(|a, b| {
        let size_a = a.behavior_hints.video_size.unwrap_or(0);
        let size_b = b.behavior_hints.video_size.unwrap_or(0);
        size_b.cmp(&size_a).then_with(|| a.name.cmp(&b.name))
    });

    records
}

/// Alternative ordering, declared by a provider: seeders desc, then quality
/// rank desc, used in place of [`assemble`]'s default size-based order.
pub fn assemble_by_seeders_then_quality(
    descriptors: Vec<MagnetDescriptor>,
    metadata: Option<&EnrichmentMetadata>,
    detection: Option<&IdDetection>,
) -> Vec<StreamRecord> {
    let mut indexed: Vec<(u32, u32, MagnetDescriptor)> = descriptors
        .into_iter()
        .filter(|d| !d.info_hash.is_empty())
        .map(|d| (d.seeders.unwrap_or(0), d.quality.rank(), d))
        .collect();
    indexed.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

    indexed
        .into_iter()
        .map(|(_, _, d)| to_record(&d, metadata, detection))
        .collect()
}

fn to_record(
    descriptor: &MagnetDescriptor,
    metadata: Option<&EnrichmentMetadata>,
    detection: Option<&IdDetection>,
) -> StreamRecord {
    let name = build_title(descriptor, detection);
    let description = build_description(descriptor, metadata);
    let sources = descriptor
        .trackers
        .iter()
        .map(|t| format!("tracker:{}", t))
        .collect();

    StreamRecord {
        name,
        description,
        info_hash: descriptor.info_hash.clone(),
        sources,
        file_idx: descriptor.file_index,
        behavior_hints: BehaviorHints {
            binge_group: format!("magnet-{}", descriptor.info_hash),
            video_size: Some(descriptor.size_bytes),
            filename: descriptor.filename.clone(),
            country_whitelist: None,
        },
    }
}

fn build_title(descriptor: &MagnetDescriptor, detection: Option<&IdDetection>) -> String {
    let emoji = match detection.map(|d| d.id_type) {
        Some(id_type) if id_type.is_anime_family() => "\u{1F38C} ",
        Some(id_type) if id_type.is_imdb_family() => "\u{1F3AC} ",
        _ => "",
    };

    let mut title = format!("{}{} | {}", emoji, descriptor.quality, descriptor.provider);

    if let (Some(season), Some(episode)) = (descriptor.season, descriptor.episode) {
        title.push_str(&format!(" | T{}E{}", season, episode));
    }

    if let Some(seeders) = descriptor.seeders {
        if seeders > 0 {
            title.push_str(&format!(" ({}S)", seeders));
        }
    }

    title
}

fn build_description(descriptor: &MagnetDescriptor, metadata: Option<&EnrichmentMetadata>) -> String {
    let mut lines = Vec::new();

    if let Some(meta) = metadata {
        if let Some(title) = &meta.title {
            match meta.year {
                Some(year) => lines.push(format!("{} ({})", title, year)),
                None => lines.push(title.clone()),
            }
        }
    }

    if let Some(filename) = &descriptor.filename {
        lines.push(truncate_filename(filename));
    }

    let mut technical = vec![descriptor.quality.to_string(), format_size(descriptor.size_bytes)];
    technical.push(descriptor.provider.clone());
    if let (Some(s), Some(e)) = (descriptor.season, descriptor.episode) {
        technical.push(format!("S{}E{}", s, e));
    }
    if let Some(language) = &descriptor.language {
        technical.push(language.clone());
    }
    if let Some(fansub) = &descriptor.fansub {
        technical.push(format!("fansub:{}", fansub));
    }
    if let Some(seeders) = descriptor.seeders {
        let leechers = descriptor.leechers.unwrap_or(0);
        technical.push(format!("{}S/{}P", seeders, leechers));
    }
    lines.push(technical.join(" | "));

    lines.join("\n")
}

fn truncate_filename(filename: &str) -> String {
    if filename.chars().count() <= MAX_FILENAME_LEN {
        return filename.to_string();
    }
    let truncated: String = filename.chars().take(MAX_FILENAME_LEN - 1).collect();
    format!("{}\u{2026}", truncated)
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit_index = 0;
    while value >= 1024.0 && unit_index < UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }
    format!("{:.2} {}", value, UNITS[unit_index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdDetector;
    use crate::magnet::Quality;

    fn descriptor(hash: &str, size: u64, provider: &str) -> MagnetDescriptor {
        MagnetDescriptor::try_new(
            "tt1".to_string(),
            format!("magnet:?xt=urn:btih:{}", hash),
            "name".to_string(),
            Quality::P1080,
            size,
            provider.to_string(),
        )
        .unwrap()
    }

    #[test]
    fn title_includes_seeders_when_positive() {
        let mut d = descriptor(&"a".repeat(40), 100, "Unknown");
        d.seeders = Some(500);
        let detection = IdDetector::new().detect("tt0133093");
        let title = build_title(&d, Some(&detection));
        assert_eq!(title, "\u{1F3AC} 1080p | Unknown (500S)");
    }

    #[test]
    fn title_omits_seeders_block_when_zero_or_absent() {
        let d = descriptor(&"a".repeat(40), 100, "p");
        assert!(!build_title(&d, None).contains("S)"));
    }

    #[test]
    fn anime_family_id_gets_anime_emoji() {
        let d = descriptor(&"a".repeat(40), 100, "p");
        let detection = IdDetector::new().detect("kitsu:1");
        assert!(build_title(&d, Some(&detection)).starts_with('\u{1F38C}'));
    }

    #[test]
    fn sources_are_prefixed_with_tracker() {
        let d = descriptor(&"a".repeat(40), 100, "p")
            .with_filtered_trackers(vec!["udp://tr.example:80".to_string()]);
        let records = assemble(vec![d], None, None);
        assert_eq!(records[0].sources[0], "tracker:udp://tr.example:80");
    }

    #[test]
    fn ordering_is_descending_size_then_title_ascending() {
        let a = descriptor(&"a".repeat(40), 100, "Zeta");
        let b = descriptor(&"b".repeat(40), 300, "Alpha");
        let c = descriptor(&"c".repeat(40), 100, "Alpha");
        let records = assemble(vec![a, b, c], None, None);
        assert_eq!(records[0].behavior_hints.video_size, Some(300));
        assert!(records[1].name < records[2].name);
    }

    #[test]
    fn descriptors_without_info_hash_never_reach_assembler() {
        let records = assemble(Vec::new(), None, None);
        assert!(records.is_empty());
    }

    #[test]
    fn filename_longer_than_budget_is_ellipsized() {
        let long = "a".repeat(120);
        assert!(truncate_filename(&long).chars().count() <= MAX_FILENAME_LEN);
        assert!(truncate_filename(&long).ends_with('\u{2026}'));
    }

    #[test]
    fn binge_group_is_derived_from_info_hash() {
        let d = descriptor(&"a".repeat(40), 100, "p");
        let records = assemble(vec![d], None, None);
        assert_eq!(records[0].behavior_hints.binge_group, format!("magnet-{}", "a".repeat(40)));
    }
}
