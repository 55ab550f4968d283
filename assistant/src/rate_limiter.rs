use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::RateLimitConfig;

/// Outcome of one check against a caller's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Milliseconds since the Unix epoch at which a slot frees up.
    pub reset_at_ms: i64,
}

impl RateLimitDecision {
    pub fn reset_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.reset_at_ms)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Whole seconds until reset, at least one.
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        let wait_ms = (self.reset_at_ms - now_ms).max(0) as u64;
        wait_ms.div_ceil(1000).max(1)
    }
}

/// Backing store for per-caller sliding windows.
///
/// Implementations must make check-and-consume atomic per key: a granted
/// slot is recorded before any other check on the same key observes the
/// window, and a denied check records nothing.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn check_and_consume(
        &self,
        key: &str,
        now_ms: i64,
        policy: &RateLimitConfig,
    ) -> Result<RateLimitDecision>;

    /// Drops windows with no live entries. Returns how many keys were removed.
    async fn purge_expired(&self, _now_ms: i64, _policy: &RateLimitConfig) -> usize {
        0
    }
}

/// Process-local sliding log. The `DashMap` entry guard holds the shard lock
/// for the whole check, which serialises concurrent requests from one address.
#[derive(Default)]
pub struct InMemoryStore {
    windows: DashMap<String, VecDeque<i64>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn check_and_consume(
        &self,
        key: &str,
        now_ms: i64,
        policy: &RateLimitConfig,
    ) -> Result<RateLimitDecision> {
        let window_ms = policy.window.as_millis() as i64;
        let limit = policy.max_requests;

        let mut admitted_log = self.windows.entry(key.to_string()).or_default();
        while admitted_log.front().is_some_and(|&admitted| admitted <= now_ms - window_ms) {
            admitted_log.pop_front();
        }

        let allowed = (admitted_log.len() as u32) < limit;
        if allowed {
            admitted_log.push_back(now_ms);
        }

        let used = admitted_log.len() as u32;
        let reset_at_ms = admitted_log.front().map_or(now_ms + window_ms, |oldest| oldest + window_ms);

        Ok(RateLimitDecision {
            allowed,
            limit,
            remaining: limit.saturating_sub(used),
            reset_at_ms,
        })
    }

    async fn purge_expired(&self, now_ms: i64, policy: &RateLimitConfig) -> usize {
        let window_ms = policy.window.as_millis() as i64;
        let before = self.windows.len();
        self.windows
            .retain(|_, log| log.back().is_some_and(|&last| last > now_ms - window_ms));
        before.saturating_sub(self.windows.len())
    }
}

/// Quota policy bound to a store. Cheap to clone.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    policy: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, policy: RateLimitConfig) -> Self {
        Self { store, policy }
    }

    pub fn in_memory(policy: RateLimitConfig) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), policy)
    }

    pub fn policy(&self) -> &RateLimitConfig {
        &self.policy
    }

    pub async fn check(&self, address: &str) -> Result<RateLimitDecision> {
        self.check_at(address, Utc::now().timestamp_millis()).await
    }

    pub async fn check_at(&self, address: &str, now_ms: i64) -> Result<RateLimitDecision> {
        let decision = self
            .store
            .check_and_consume(address, now_ms, &self.policy)
            .await?;

        if !decision.allowed {
            log::warn!(
                "Rate limit exceeded for {address}: {} requests per {}s",
                decision.limit,
                self.policy.window.as_secs()
            );
        }
        Ok(decision)
    }

    pub async fn purge_expired(&self) -> usize {
        self.store
            .purge_expired(Utc::now().timestamp_millis(), &self.policy)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy() -> RateLimitConfig {
        RateLimitConfig {
            max_requests: 5,
            window: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn sixth_request_in_window_is_denied() {
        let limiter = RateLimiter::in_memory(policy());
        let start = 1_700_000_000_000;

        for i in 0..5 {
            let decision = limiter.check_at("10.0.0.1", start + i * 1000).await.unwrap();
            assert!(decision.allowed, "request {} should pass", i + 1);
            assert_eq!(decision.remaining, 4 - i as u32);
        }

        let denied = limiter.check_at("10.0.0.1", start + 5_000).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.limit, 5);
        assert_eq!(denied.reset_at_ms, start + 30_000);
        assert_eq!(denied.retry_after_secs(start + 5_000), 25);
    }

    #[tokio::test]
    async fn window_slides_as_old_requests_expire() {
        let limiter = RateLimiter::in_memory(policy());
        let start = 1_700_000_000_000;

        for i in 0..5 {
            limiter.check_at("10.0.0.1", start + i * 1000).await.unwrap();
        }
        assert!(!limiter.check_at("10.0.0.1", start + 29_999).await.unwrap().allowed);

        // The first request ages out at exactly one window.
        let after = limiter.check_at("10.0.0.1", start + 30_000).await.unwrap();
        assert!(after.allowed);
        assert_eq!(after.remaining, 0);
    }

    #[tokio::test]
    async fn addresses_are_counted_independently() {
        let limiter = RateLimiter::in_memory(policy());
        let now = 1_700_000_000_000;
        for _ in 0..5 {
            limiter.check_at("10.0.0.1", now).await.unwrap();
        }
        assert!(!limiter.check_at("10.0.0.1", now).await.unwrap().allowed);
        assert!(limiter.check_at("10.0.0.2", now).await.unwrap().allowed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checks_never_over_grant() {
        let store = Arc::new(InMemoryStore::new());
        let limiter = RateLimiter::new(store, policy());
        let now = 1_700_000_000_000;

        let handles: Vec<_> = (0..40)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check_at("10.0.0.9", now).await.unwrap() })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().allowed {
                granted += 1;
            }
        }
        assert_eq!(granted, 5);
    }

    #[tokio::test]
    async fn purge_drops_idle_windows() {
        let store = InMemoryStore::new();
        let policy = policy();
        let now = 1_700_000_000_000;
        store.check_and_consume("old", now, &policy).await.unwrap();
        store.check_and_consume("fresh", now + 20_000, &policy).await.unwrap();

        let removed = store.purge_expired(now + 31_000, &policy).await;
        assert_eq!(removed, 1);
        assert_eq!(store.tracked_keys(), 1);
    }
}
