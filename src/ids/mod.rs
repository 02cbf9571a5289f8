//! Identifier classification, validation and cross-namespace conversion.

pub mod unified;
pub mod validator;

pub use unified::UnifiedIdService;
pub use validator::{DynamicValidator, ValidationContext, ValidationResult};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    // Digit-count is intentionally unbounded here: the 7-digit floor is a
    // *strict-context* validation rule (see DynamicValidator::validate_imdb),
    // not a detection-time rejection, so "tt0" still classifies as imdb.
    static ref IMDB_SERIES_RE: Regex = Regex::new(r"^tt\d+:\d{1,3}:\d{1,3}$").unwrap();
    static ref IMDB_RE: Regex = Regex::new(r"^tt\d+$").unwrap();
    static ref KITSU_RE: Regex = Regex::new(r"^kitsu:\d+$").unwrap();
    static ref MAL_RE: Regex = Regex::new(r"^mal:\d+$").unwrap();
    static ref ANILIST_RE: Regex = Regex::new(r"^anilist:\d+$").unwrap();
    static ref ANIDB_RE: Regex = Regex::new(r"^anidb:\d+$").unwrap();
    static ref NUMERIC_RE: Regex = Regex::new(r"^\d+$").unwrap();
}

/// The tagged variant an identifier was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdType {
    Imdb,
    ImdbSeries,
    Kitsu,
    Mal,
    Anilist,
    Anidb,
    Numeric,
    Unknown,
}

impl IdType {
    pub fn is_anime_family(self) -> bool {
        matches!(
            self,
            IdType::Kitsu | IdType::Mal | IdType::Anilist | IdType::Anidb
        )
    }

    pub fn is_imdb_family(self) -> bool {
        matches!(self, IdType::Imdb | IdType::ImdbSeries)
    }
}

impl std::fmt::Display for IdType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IdType::Imdb => "imdb",
            IdType::ImdbSeries => "imdb-series",
            IdType::Kitsu => "kitsu",
            IdType::Mal => "mal",
            IdType::Anilist => "anilist",
            IdType::Anidb => "anidb",
            IdType::Numeric => "numeric",
            IdType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Result of classifying a raw identifier string.
#[derive(Debug, Clone, Serialize)]
pub struct IdDetection {
    pub id_type: IdType,
    pub original_id: String,
    pub normalized_id: String,
    pub confidence: f64,
    pub is_valid: bool,
    pub error: Option<String>,
}

/// Classifies a raw identifier string into a tagged variant. Never panics;
/// empty input always yields `{unknown, isValid:false}`.
pub struct IdDetector;

impl Default for IdDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl IdDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, raw: &str) -> IdDetection {
        if raw.is_empty() {
            return IdDetection {
                id_type: IdType::Unknown,
                original_id: raw.to_string(),
                normalized_id: raw.to_string(),
                confidence: 0.0,
                is_valid: false,
                error: Some("empty id".to_string()),
            };
        }

        let (id_type, confidence) = if IMDB_SERIES_RE.is_match(raw) {
            (IdType::ImdbSeries, 1.0)
        } else if IMDB_RE.is_match(raw) {
            (IdType::Imdb, 1.0)
        } else if KITSU_RE.is_match(raw) {
            (IdType::Kitsu, 1.0)
        } else if MAL_RE.is_match(raw) {
            (IdType::Mal, 1.0)
        } else if ANILIST_RE.is_match(raw) {
            (IdType::Anilist, 1.0)
        } else if ANIDB_RE.is_match(raw) {
            (IdType::Anidb, 1.0)
        } else if NUMERIC_RE.is_match(raw) {
            (IdType::Numeric, 0.5)
        } else {
            (IdType::Unknown, 0.0)
        };

        IdDetection {
            id_type,
            original_id: raw.to_string(),
            normalized_id: raw.to_string(),
            confidence,
            is_valid: id_type != IdType::Unknown,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_id_is_invalid_unknown() {
        let d = IdDetector::new().detect("");
        assert_eq!(d.id_type, IdType::Unknown);
        assert!(!d.is_valid);
        assert!(d.error.is_some());
    }

    #[test]
    fn detects_imdb_movie() {
        let d = IdDetector::new().detect("tt0133093");
        assert_eq!(d.id_type, IdType::Imdb);
        assert_eq!(d.confidence, 1.0);
        assert!(d.is_valid);
    }

    #[test]
    fn detects_imdb_series_episode() {
        let d = IdDetector::new().detect("tt0903747:3:9");
        assert_eq!(d.id_type, IdType::ImdbSeries);
        assert!(d.is_valid);
    }

    #[test]
    fn detects_kitsu_mal_anilist_anidb() {
        assert_eq!(IdDetector::new().detect("kitsu:11665").id_type, IdType::Kitsu);
        assert_eq!(IdDetector::new().detect("mal:1").id_type, IdType::Mal);
        assert_eq!(IdDetector::new().detect("anilist:1").id_type, IdType::Anilist);
        assert_eq!(IdDetector::new().detect("anidb:1").id_type, IdType::Anidb);
    }

    #[test]
    fn numeric_has_low_confidence() {
        let d = IdDetector::new().detect("12345");
        assert_eq!(d.id_type, IdType::Numeric);
        assert_eq!(d.confidence, 0.5);
        assert!(d.is_valid);
    }

    #[test]
    fn unrecognized_text_is_unknown() {
        let d = IdDetector::new().detect("not-an-id!!");
        assert_eq!(d.id_type, IdType::Unknown);
        assert!(!d.is_valid);
    }

    #[test]
    fn detect_is_idempotent_on_normalized_id() {
        for raw in ["tt0133093", "kitsu:11665", "12345", "anidb:42"] {
            let first = IdDetector::new().detect(raw);
            if first.is_valid {
                let second = IdDetector::new().detect(&first.normalized_id);
                assert_eq!(first.id_type, second.id_type);
            }
        }
    }
}
