//! Per-provider sliding-window rate limiting, backed by `governor`.
//!
//! Each provider gets its own limiter instance; rate-limit state is never
//! shared across provider ids.

use dashmap::DashMap;
use governor::{Quota, RateLimiter as GovernorLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = GovernorLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Registry of per-provider rate limiters, keyed by provider id.
pub struct ProviderRateLimiters {
    limiters: DashMap<String, Arc<DirectLimiter>>,
}

impl Default for ProviderRateLimiters {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRateLimiters {
    pub fn new() -> Self {
        Self {
            limiters: DashMap::new(),
        }
    }

    fn limiter_for(&self, provider_id: &str, requests_per_minute: u32) -> Arc<DirectLimiter> {
        if let Some(existing) = self.limiters.get(provider_id) {
            return existing.clone();
        }

        let one = NonZeroU32::new(1).unwrap();
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute.max(1)).unwrap_or(one));
        let limiter = Arc::new(GovernorLimiter::direct(quota));
        self.limiters
            .insert(provider_id.to_string(), limiter.clone());
        limiter
    }

    /// Cooperatively sleeps until the next slot is available for `provider_id`.
    pub async fn wait(&self, provider_id: &str, requests_per_minute: u32) {
        let limiter = self.limiter_for(provider_id, requests_per_minute);
        limiter.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn first_call_does_not_block() {
        let limiters = ProviderRateLimiters::new();
        let start = Instant::now();
        limiters.wait("yts", 60).await;
        assert!(start.elapsed().as_millis() < 200);
    }

    #[tokio::test]
    async fn distinct_providers_have_independent_budgets() {
        let limiters = ProviderRateLimiters::new();
        limiters.wait("a", 1).await;
        let start = Instant::now();
        limiters.wait("b", 60).await;
        assert!(start.elapsed().as_millis() < 200);
    }
}
