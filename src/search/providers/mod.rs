//! Scraping provider trait and the concrete provider implementations.

pub mod fourk_provider;
pub mod general_provider;
pub mod latino_provider;

pub use fourk_provider::FourKProvider;
pub use general_provider::GeneralProvider;
pub use latino_provider::LatinoProvider;

use async_trait::async_trait;

use crate::error::AppError;
use crate::magnet::MagnetDescriptor;
use crate::search::SearchQuery;

/// Shared skeleton every scraping provider implements: base URL, a ranking
/// bias toward its specialty, and a title-overlap validation threshold.
#[async_trait]
pub trait ScrapeProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Minimum fraction of query words that must appear in a result title
    /// for preferred-language matches.
    fn preferred_overlap_threshold(&self) -> f64 {
        0.5
    }

    /// Threshold for everything else.
    fn default_overlap_threshold(&self) -> f64 {
        0.6
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<MagnetDescriptor>, AppError>;

    /// Higher is better; applied after the base ordering to push a
    /// provider's specialty (4K, Latino/Spanish, ...) toward the top.
    fn rank_bias(&self, descriptor: &MagnetDescriptor) -> i32 {
        let _ = descriptor;
        0
    }
}

/// Validates a candidate title against the query by word overlap, per the
/// shared provider skeleton's preferred/default overlap thresholds.
pub fn title_overlap_ratio(query_term: &str, candidate_title: &str) -> f64 {
    let query_words: std::collections::HashSet<String> = query_term
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if query_words.is_empty() {
        return 0.0;
    }
    let candidate_words: std::collections::HashSet<String> = candidate_title
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let overlap = query_words.intersection(&candidate_words).count();
    overlap as f64 / query_words.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_overlap_scores_one() {
        assert_eq!(title_overlap_ratio("the matrix", "the matrix 1080p"), 1.0);
    }

    #[test]
    fn partial_overlap_scores_fraction() {
        assert_eq!(title_overlap_ratio("the matrix reloaded", "the matrix"), 2.0 / 3.0);
    }

    #[test]
    fn empty_query_scores_zero() {
        assert_eq!(title_overlap_ratio("", "anything"), 0.0);
    }
}
