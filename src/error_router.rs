//! Classifies errors into a recovery strategy and maintains a per-operation
//! circuit breaker, generalizing the [`crate::error`] taxonomy into action.

use dashmap::DashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{AppError, ErrorKind};

/// Recovery strategy chosen for a given error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    RetryWithBackoff,
    Fallback,
    CacheFallback,
    GracefulDegradation,
    FailFast,
}

fn strategy_for(kind: ErrorKind) -> Strategy {
    match kind {
        ErrorKind::Network | ErrorKind::Timeout | ErrorKind::RateLimit => Strategy::RetryWithBackoff,
        ErrorKind::Repository => Strategy::Fallback,
        ErrorKind::Cache => Strategy::GracefulDegradation,
        ErrorKind::Validation | ErrorKind::Authentication | ErrorKind::Configuration => {
            Strategy::FailFast
        }
        ErrorKind::Unknown => Strategy::GracefulDegradation,
    }
}

/// cacheMaxAge, in seconds, assigned to the fallback response for a given
/// error kind once recovery has been exhausted.
pub fn fallback_cache_max_age(kind: ErrorKind) -> u64 {
    match kind {
        ErrorKind::Validation => 60,
        ErrorKind::Network | ErrorKind::Timeout => 30,
        ErrorKind::RateLimit => 900,
        ErrorKind::Repository => 300,
        ErrorKind::Cache | ErrorKind::Unknown | ErrorKind::Authentication | ErrorKind::Configuration => {
            300
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BreakerEntry {
    opened_at: Instant,
    cooldown: Duration,
    kind: ErrorKind,
}

/// Backoff policy: `baseDelay · multiplier^(n-1)`, capped at `maxDelay`.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            max_attempts: 3,
        }
    }
}

impl BackoffPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

/// Per-operation circuit breaker plus retry/backoff orchestration.
///
/// `closed —(final-failure)→ open —(cooldown-expired ∧ call succeeds)→ closed`.
pub struct ErrorRouter {
    breakers: DashMap<String, BreakerEntry>,
    backoff: BackoffPolicy,
    default_cooldown: Duration,
}

impl Default for ErrorRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorRouter {
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
            backoff: BackoffPolicy::default(),
            default_cooldown: Duration::from_secs(300),
        }
    }

    /// `true` while the breaker for `operation` is open (cooldown not yet elapsed).
    pub fn is_open(&self, operation: &str) -> bool {
        match self.breakers.get(operation) {
            Some(entry) => entry.opened_at.elapsed() < entry.cooldown,
            None => false,
        }
    }

    fn open(&self, operation: &str, kind: ErrorKind) {
        self.breakers.insert(
            operation.to_string(),
            BreakerEntry {
                opened_at: Instant::now(),
                cooldown: self.default_cooldown,
                kind,
            },
        );
    }

    /// Closes the breaker immediately, independent of cooldown state.
    pub fn reset(&self, operation: &str) {
        self.breakers.remove(operation);
    }

    /// Runs `op`, retrying per [`BackoffPolicy`] on recoverable errors. If the
    /// breaker for `operation` is open, the call is not attempted at all and
    /// the last-known error is returned immediately so the caller can fall
    /// back without delay.
    pub async fn execute<F, Fut, T>(&self, operation: &str, mut op: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Some(entry) = self.breakers.get(operation) {
            if entry.opened_at.elapsed() < entry.cooldown {
                return Err(AppError::new(
                    entry.kind,
                    operation,
                    "circuit breaker open, short-circuiting call",
                ));
            }
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    self.reset(operation);
                    return Ok(value);
                }
                Err(err) => {
                    let strategy = strategy_for(err.kind);
                    let is_last = attempt >= self.backoff.max_attempts;

                    if strategy != Strategy::RetryWithBackoff || is_last {
                        if strategy == Strategy::RetryWithBackoff {
                            self.open(operation, err.kind);
                            tracing::warn!(operation, kind = %err.kind, "breaker opened after exhausting retries");
                        }
                        return Err(err);
                    }

                    let delay = self.backoff.delay_for_attempt(attempt);
                    tracing::debug!(operation, attempt, ?delay, kind = %err.kind, "retrying after error");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    pub fn strategy_for(&self, kind: ErrorKind) -> Strategy {
        strategy_for(kind)
    }

    /// Operation names whose breaker is currently open, for `GET /api/health`.
    pub fn open_breakers(&self) -> Vec<String> {
        let now = Instant::now();
        self.breakers
            .iter()
            .filter(|entry| now.duration_since(entry.opened_at) < entry.cooldown)
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn strategy_map_matches_taxonomy() {
        assert_eq!(strategy_for(ErrorKind::Network), Strategy::RetryWithBackoff);
        assert_eq!(strategy_for(ErrorKind::Timeout), Strategy::RetryWithBackoff);
        assert_eq!(strategy_for(ErrorKind::RateLimit), Strategy::RetryWithBackoff);
        assert_eq!(strategy_for(ErrorKind::Repository), Strategy::Fallback);
        assert_eq!(strategy_for(ErrorKind::Cache), Strategy::GracefulDegradation);
        assert_eq!(strategy_for(ErrorKind::Validation), Strategy::FailFast);
        assert_eq!(strategy_for(ErrorKind::Authentication), Strategy::FailFast);
        assert_eq!(strategy_for(ErrorKind::Configuration), Strategy::FailFast);
        assert_eq!(strategy_for(ErrorKind::Unknown), Strategy::GracefulDegradation);
    }

    #[test]
    fn cache_max_age_matches_spec_values() {
        assert_eq!(fallback_cache_max_age(ErrorKind::Validation), 60);
        assert_eq!(fallback_cache_max_age(ErrorKind::Network), 30);
        assert_eq!(fallback_cache_max_age(ErrorKind::RateLimit), 900);
        assert_eq!(fallback_cache_max_age(ErrorKind::Repository), 300);
    }

    #[tokio::test]
    async fn successful_call_keeps_breaker_closed() {
        let router = ErrorRouter::new();
        let result = router.execute("op", || async { Ok::<_, AppError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert!(!router.is_open("op"));
    }

    #[tokio::test]
    async fn retries_recoverable_errors_then_opens_breaker() {
        let router = ErrorRouter::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<(), AppError> = router
            .execute("flaky", || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::network("flaky", "ECONNREFUSED"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(router.is_open("flaky"));
    }

    #[tokio::test]
    async fn open_breaker_short_circuits_without_calling() {
        let router = ErrorRouter::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let _: Result<(), AppError> = router
            .execute("flaky", || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::network("flaky", "ECONNREFUSED"))
                }
            })
            .await;
        assert!(router.is_open("flaky"));

        let before = calls.load(Ordering::SeqCst);
        let result: Result<(), AppError> = router.execute("flaky", || async { Ok(()) }).await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn fail_fast_errors_are_not_retried() {
        let router = ErrorRouter::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let _: Result<(), AppError> = router
            .execute("validate", || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::validation("validate", "bad id"))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!router.is_open("validate"));
    }

    #[tokio::test]
    async fn short_circuited_call_preserves_opening_error_kind() {
        let router = ErrorRouter::new();
        let _: Result<(), AppError> = router
            .execute("flaky", || async { Err(AppError::timeout("flaky", "timed out")) })
            .await;
        assert!(router.is_open("flaky"));

        let result: Result<(), AppError> = router.execute("flaky", || async { Ok(()) }).await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::Timeout);
    }

    #[test]
    fn reset_closes_breaker_immediately() {
        let router = ErrorRouter::new();
        router.open("x", ErrorKind::Network);
        assert!(router.is_open("x"));
        router.reset("x");
        assert!(!router.is_open("x"));
    }
}
