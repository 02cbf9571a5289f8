//! Per-context, per-type validation rules layered on top of [`super::IdDetector`].

use crate::error::AppError;
use crate::ids::{IdDetection, IdType};

/// Named validation context; each declares which id types it permits and
/// whether conversion/strict mode apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationContext {
    StreamRequest,
    ApiEndpoint,
    Diagnostic,
}

impl ValidationContext {
    fn allow_conversion(self) -> bool {
        !matches!(self, ValidationContext::ApiEndpoint)
    }

    fn strict(self) -> bool {
        matches!(self, ValidationContext::ApiEndpoint)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub recommendation: Option<String>,
    pub error: Option<AppError>,
}

impl ValidationResult {
    fn ok(recommendation: Option<String>) -> Self {
        Self {
            valid: true,
            recommendation,
            error: None,
        }
    }

    fn fail(error: AppError) -> Self {
        Self {
            valid: false,
            recommendation: None,
            error: Some(error),
        }
    }
}

/// Applies per-type syntactic rules plus per-context business rules to an
/// already-classified identifier.
pub struct DynamicValidator;

impl Default for DynamicValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, detection: &IdDetection, context: ValidationContext) -> ValidationResult {
        if !detection.is_valid {
            return ValidationResult::fail(AppError::validation(
                "id_validator",
                detection
                    .error
                    .clone()
                    .unwrap_or_else(|| "unrecognized identifier".to_string()),
            ));
        }

        let strict = context.strict();

        let result = match detection.id_type {
            IdType::Imdb | IdType::ImdbSeries => self.validate_imdb(&detection.normalized_id, strict),
            IdType::Kitsu => self.validate_bounded(&detection.normalized_id, "kitsu:", 1, 1_000_000),
            IdType::Mal => self.validate_bounded(&detection.normalized_id, "mal:", 1, 60_000),
            IdType::Anilist => self.validate_bounded(&detection.normalized_id, "anilist:", 1, 200_000),
            IdType::Anidb => self.validate_bounded(&detection.normalized_id, "anidb:", 1, 30_000),
            IdType::Numeric => Ok(()),
            IdType::Unknown => Err(AppError::validation("id_validator", "unknown id type")),
        };

        match result {
            Ok(()) => {
                let recommendation = if context.allow_conversion()
                    && detection.id_type.is_anime_family()
                {
                    Some("consider converting to imdb for wider source coverage".to_string())
                } else {
                    None
                };
                ValidationResult::ok(recommendation)
            }
            Err(e) => ValidationResult::fail(e),
        }
    }

    fn validate_imdb(&self, normalized: &str, strict: bool) -> Result<(), AppError> {
        let digits_part = normalized
            .trim_start_matches("tt")
            .split(':')
            .next()
            .unwrap_or("");
        let numeric: u64 = digits_part
            .parse()
            .map_err(|_| AppError::validation("id_validator", "imdb id has no numeric part"))?;
        if numeric < 1 {
            return Err(AppError::validation("id_validator", "imdb numeric part must be >= 1"));
        }
        if strict && digits_part.len() < 7 {
            return Err(AppError::validation(
                "id_validator",
                "strict mode requires at least 7 digits",
            ));
        }

        if let Some((season, episode)) = crate::magnet::parse_embedded_episode(normalized) {
            if !(1..=100).contains(&season) {
                return Err(AppError::validation("id_validator", "season out of range [1,100]"));
            }
            if !(1..=999).contains(&episode) {
                return Err(AppError::validation("id_validator", "episode out of range [1,999]"));
            }
        }

        Ok(())
    }

    fn validate_bounded(
        &self,
        normalized: &str,
        prefix: &str,
        min: u64,
        max: u64,
    ) -> Result<(), AppError> {
        let digits = normalized.trim_start_matches(prefix);
        let numeric: u64 = digits
            .parse()
            .map_err(|_| AppError::validation("id_validator", "non-numeric ordinal"))?;
        if numeric < min || numeric > max {
            return Err(AppError::validation(
                "id_validator",
                format!("ordinal {} outside bound [{}, {}]", numeric, min, max),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdDetector;

    fn detect(raw: &str) -> IdDetection {
        IdDetector::new().detect(raw)
    }

    #[test]
    fn strict_mode_rejects_short_imdb_id() {
        let d = detect("tt0");
        let result = DynamicValidator::new().validate(&d, ValidationContext::ApiEndpoint);
        assert!(!result.valid);
    }

    #[test]
    fn non_strict_mode_accepts_short_imdb_id() {
        // Fewer than 7 digits, but a nonzero numeric part: only the
        // strict-context digit-length rule should reject ids like this, not
        // the unconditional "numeric part >= 1" one.
        let d = detect("tt00001");
        let result = DynamicValidator::new().validate(&d, ValidationContext::StreamRequest);
        assert!(result.valid);
    }

    #[test]
    fn zero_numeric_part_fails_in_every_context() {
        let d = detect("tt0");
        assert!(!DynamicValidator::new()
            .validate(&d, ValidationContext::StreamRequest)
            .valid);
        assert!(!DynamicValidator::new()
            .validate(&d, ValidationContext::ApiEndpoint)
            .valid);
    }

    #[test]
    fn kitsu_within_bound_is_valid() {
        let d = detect("kitsu:11665");
        let result = DynamicValidator::new().validate(&d, ValidationContext::StreamRequest);
        assert!(result.valid);
        assert!(result.recommendation.is_some());
    }

    #[test]
    fn mal_above_strict_bound_fails() {
        let d = detect("mal:70000");
        let result = DynamicValidator::new().validate(&d, ValidationContext::StreamRequest);
        assert!(!result.valid);
    }

    #[test]
    fn imdb_series_season_episode_bounds_enforced() {
        let d = detect("tt0903747:3:9");
        assert!(DynamicValidator::new()
            .validate(&d, ValidationContext::StreamRequest)
            .valid);

        let d_bad = detect("tt0903747:0:9");
        assert!(!DynamicValidator::new()
            .validate(&d_bad, ValidationContext::StreamRequest)
            .valid);
    }

    #[test]
    fn invalid_detection_surfaces_as_validation_error() {
        let d = detect("");
        let result = DynamicValidator::new().validate(&d, ValidationContext::StreamRequest);
        assert!(!result.valid);
        assert_eq!(result.error.unwrap().kind, crate::error::ErrorKind::Validation);
    }
}
