//! Application-wide error taxonomy for the stream resolver.
//!
//! Every error raised anywhere in the pipeline is classified into one of a
//! fixed set of kinds. The classification drives the recovery strategy
//! chosen by [`crate::error_router`] and the HTTP status/body returned to
//! clients.

#![allow(dead_code)]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Error taxonomy used throughout the resolution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Network,
    Timeout,
    Repository,
    Cache,
    RateLimit,
    Authentication,
    Configuration,
    Unknown,
}

impl ErrorKind {
    /// NETWORK, TIMEOUT, RATE_LIMIT and CACHE are considered recoverable;
    /// the router retries or degrades gracefully instead of failing fast.
    pub fn recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::RateLimit | ErrorKind::Cache
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Network => "NETWORK",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Repository => "REPOSITORY",
            ErrorKind::Cache => "CACHE",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::Authentication => "AUTHENTICATION",
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A classified error carrying enough context for the router and the logs.
#[derive(Error, Debug, Clone)]
#[error("{kind}[{context}]: {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    /// Name of the operation that raised this error, e.g. `"aggregator.search_by_id"`.
    pub context: String,
    pub original_cause: Option<String>,
}

impl AppError {
    pub fn new(kind: ErrorKind, context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: context.into(),
            original_cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.original_cause = Some(cause.to_string());
        self
    }

    pub fn validation(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, context, message)
    }

    pub fn not_found(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Repository, context, message)
    }

    pub fn network(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, context, message)
    }

    pub fn timeout(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, context, message)
    }

    pub fn configuration(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, context, message)
    }

    pub fn recoverable(&self) -> bool {
        self.kind.recoverable()
    }

    /// Classify a raw error string by name/message substring, per the
    /// taxonomy rules used across the pipeline's boundary calls.
    pub fn classify(context: impl Into<String>, raw: impl fmt::Display) -> Self {
        let text = raw.to_string();
        let lower = text.to_lowercase();
        let kind = if lower.contains("econnrefused")
            || lower.contains("enotfound")
            || lower.contains("dns")
            || lower.contains("network")
        {
            ErrorKind::Network
        } else if lower.contains("timeout") || lower.contains("etimedout") || lower.contains("deadline")
        {
            ErrorKind::Timeout
        } else if lower.contains("rate limit") || lower.contains("too many requests") || lower.contains("429")
        {
            ErrorKind::RateLimit
        } else if lower.contains("unauthorized")
            || lower.contains("forbidden")
            || lower.contains("401")
            || lower.contains("403")
        {
            ErrorKind::Authentication
        } else if lower.contains("invalid") || lower.contains("validation") || lower.contains("malformed")
        {
            ErrorKind::Validation
        } else {
            ErrorKind::Unknown
        };
        Self::new(kind, context, text)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::new(ErrorKind::Timeout, "http_client", e.to_string())
        } else if e.is_connect() {
            AppError::new(ErrorKind::Network, "http_client", e.to_string())
        } else {
            AppError::classify("http_client", e)
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, "config", e.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::new(ErrorKind::Repository, "snapshot_store", e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::new(ErrorKind::Repository, "io", e.to_string())
    }
}

/// JSON error body rendered by the thin HTTP layer.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    error_type: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.kind {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Repository => StatusCode::NOT_FOUND,
            ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Network => StatusCode::BAD_GATEWAY,
            ErrorKind::Configuration | ErrorKind::Cache | ErrorKind::Unknown => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        tracing::error!(kind = %self.kind, context = %self.context, cause = ?self.original_cause, "request failed: {}", self.message);

        let body = ErrorResponse {
            error: format!("{}_ERROR", self.kind),
            error_type: self.kind.to_string(),
            message: self.message,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias used throughout the pipeline.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_network_errors() {
        let e = AppError::classify("x", "ECONNREFUSED: connection refused");
        assert_eq!(e.kind, ErrorKind::Network);
    }

    #[test]
    fn classifies_timeout_errors() {
        let e = AppError::classify("x", "request timeout after 30s");
        assert_eq!(e.kind, ErrorKind::Timeout);
    }

    #[test]
    fn classifies_rate_limit_errors() {
        let e = AppError::classify("x", "429 Too Many Requests");
        assert_eq!(e.kind, ErrorKind::RateLimit);
    }

    #[test]
    fn classifies_unknown_by_default() {
        let e = AppError::classify("x", "something weird happened");
        assert_eq!(e.kind, ErrorKind::Unknown);
    }

    #[test]
    fn recoverable_kinds() {
        assert!(ErrorKind::Network.recoverable());
        assert!(ErrorKind::Timeout.recoverable());
        assert!(ErrorKind::RateLimit.recoverable());
        assert!(ErrorKind::Cache.recoverable());
        assert!(!ErrorKind::Validation.recoverable());
        assert!(!ErrorKind::Authentication.recoverable());
    }

    #[test]
    fn not_found_status() {
        let e = AppError::not_found("repo", "no descriptors found");
        assert_eq!(e.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_status() {
        let e = AppError::validation("ids", "unrecognized id format");
        assert_eq!(e.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
