//! Allow/deny decision front end.
//!
//! Wraps a primary store (SQLite) and an always-present in-memory fallback.
//! A store failure never surfaces to the caller: the same attempt is
//! recomputed against the fallback, trading cross-process consistency for
//! availability. Route handlers translate a denied decision into HTTP 429
//! with `Retry-After` taken from `retry_after_secs`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, warn};

use crate::config::{LimitPolicy, LimiterConfig};
use crate::store::{InMemoryRateLimitStore, LimitKind, RateLimitStore};
use crate::sweeper::CleanupSweeper;
use crate::window::LimitDecision;

/// Type alias for a shared rate limit store.
pub type SharedStore = Arc<dyn RateLimitStore>;

/// Rate limiter over a primary store with in-memory fallback.
///
/// Constructed explicitly and injected where needed; there is no global
/// instance. Use [`RateLimiter::in_memory`] for deployments that run without
/// the database path.
pub struct RateLimiter {
    primary: Option<SharedStore>,
    fallback: Arc<InMemoryRateLimitStore>,
    config: LimiterConfig,
}

impl RateLimiter {
    /// Create a limiter backed by a primary store, with in-memory fallback.
    pub fn new(primary: SharedStore, config: LimiterConfig) -> Self {
        let fallback = Arc::new(InMemoryRateLimitStore::with_config(
            config.fallback.clone(),
        ));
        Self {
            primary: Some(primary),
            fallback,
            config,
        }
    }

    /// Create a limiter that only uses the in-memory store.
    pub fn in_memory(config: LimiterConfig) -> Self {
        let fallback = Arc::new(InMemoryRateLimitStore::with_config(
            config.fallback.clone(),
        ));
        Self {
            primary: None,
            fallback,
            config,
        }
    }

    fn policy(&self, kind: LimitKind) -> &LimitPolicy {
        match kind {
            LimitKind::Login => &self.config.login,
            LimitKind::Admin => &self.config.admin,
        }
    }

    /// Check a login attempt for the given client identifier.
    pub async fn check_login(&self, client_id: &str) -> LimitDecision {
        self.check(client_id, LimitKind::Login).await
    }

    /// Check an admin mutation request for the given client identifier.
    pub async fn check_admin(&self, client_id: &str) -> LimitDecision {
        self.check(client_id, LimitKind::Admin).await
    }

    async fn check(&self, client_id: &str, kind: LimitKind) -> LimitDecision {
        let policy = self.policy(kind);
        let now_ms = Utc::now().timestamp_millis();

        if let Some(primary) = &self.primary {
            match primary.record_attempt(client_id, kind, policy, now_ms).await {
                Ok(decision) => return decision,
                Err(e) => {
                    error!(
                        identifier = client_id,
                        endpoint = %kind,
                        error = %e,
                        "primary rate limit store failed, using in-memory fallback"
                    );
                }
            }
        }

        match self
            .fallback
            .record_attempt(client_id, kind, policy, now_ms)
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                // Both paths down: fail open rather than lock everyone out.
                warn!(
                    identifier = client_id,
                    endpoint = %kind,
                    error = %e,
                    "fallback rate limit store failed, allowing request"
                );
                LimitDecision::fail_open()
            }
        }
    }

    /// Admin operation: clear a client's record in both stores.
    pub async fn reset(&self, client_id: &str, kind: LimitKind) {
        if let Some(primary) = &self.primary {
            if let Err(e) = primary.reset(client_id, kind).await {
                error!(
                    identifier = client_id,
                    endpoint = %kind,
                    error = %e,
                    "failed to reset rate limit in primary store"
                );
            }
        }
        // Infallible for the in-memory store, but the trait says Result.
        if let Err(e) = self.fallback.reset(client_id, kind).await {
            warn!(identifier = client_id, error = %e, "failed to reset rate limit in fallback store");
        }
    }

    /// All stores this limiter writes to, fallback last.
    pub fn stores(&self) -> Vec<SharedStore> {
        let mut stores: Vec<SharedStore> = Vec::new();
        if let Some(primary) = &self.primary {
            stores.push(Arc::clone(primary));
        }
        stores.push(self.fallback.clone());
        stores
    }

    /// The in-memory fallback store (exposed for inspection).
    pub fn fallback(&self) -> &Arc<InMemoryRateLimitStore> {
        &self.fallback
    }

    /// Spawn the periodic cleanup sweeper for this limiter's stores.
    pub fn spawn_sweeper(&self) -> CleanupSweeper {
        CleanupSweeper::start(self.stores(), self.config.sweep_interval)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("has_primary", &self.primary.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimiterConfig;
    use crate::store::{StoreError, StoreResult};
    use async_trait::async_trait;

    /// Primary store that always fails, simulating a database outage.
    struct FailingStore;

    #[async_trait]
    impl RateLimitStore for FailingStore {
        async fn record_attempt(
            &self,
            _identifier: &str,
            _kind: LimitKind,
            _policy: &LimitPolicy,
            _now_ms: i64,
        ) -> StoreResult<LimitDecision> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn reset(&self, _identifier: &str, _kind: LimitKind) -> StoreResult<bool> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn cleanup_expired(
            &self,
            _now_ms: i64,
            _kind: Option<LimitKind>,
        ) -> StoreResult<u64> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn login_scenario_five_allowed_then_denied() {
        let limiter = RateLimiter::in_memory(LimiterConfig::default());

        for i in 1..=5u32 {
            let decision = limiter.check_login("1.2.3.4").await;
            assert!(decision.allowed);
            assert_eq!(decision.current_count, i);
        }

        let denied = limiter.check_login("1.2.3.4").await;
        assert!(!denied.allowed);
        assert!(denied.retry_after_secs.unwrap() > 0);
    }

    #[tokio::test]
    async fn failing_primary_matches_memory_only_decisions() {
        let degraded = RateLimiter::new(Arc::new(FailingStore), LimiterConfig::default());
        let memory_only = RateLimiter::in_memory(LimiterConfig::default());

        for _ in 0..8 {
            let a = degraded.check_login("5.6.7.8").await;
            let b = memory_only.check_login("5.6.7.8").await;
            assert_eq!(a.allowed, b.allowed);
            assert_eq!(a.current_count, b.current_count);
        }
    }

    #[tokio::test]
    async fn admin_limit_uses_its_own_policy() {
        let limiter = RateLimiter::in_memory(LimiterConfig::default());

        for i in 1..=10u32 {
            let decision = limiter.check_admin("10.0.0.1").await;
            assert!(decision.allowed);
            assert_eq!(decision.current_count, i);
        }
        assert!(!limiter.check_admin("10.0.0.1").await.allowed);

        // The login bucket for the same client is untouched.
        assert!(limiter.check_login("10.0.0.1").await.allowed);
    }

    #[tokio::test]
    async fn reset_unblocks_client() {
        let limiter = RateLimiter::in_memory(LimiterConfig::default());

        for _ in 0..6 {
            limiter.check_login("4.4.4.4").await;
        }
        assert!(!limiter.check_login("4.4.4.4").await.allowed);

        limiter.reset("4.4.4.4", LimitKind::Login).await;
        let decision = limiter.check_login("4.4.4.4").await;
        assert!(decision.allowed);
        assert_eq!(decision.current_count, 1);
    }

    #[tokio::test]
    async fn reset_survives_failing_primary() {
        let limiter = RateLimiter::new(Arc::new(FailingStore), LimiterConfig::default());

        for _ in 0..6 {
            limiter.check_login("4.4.4.4").await;
        }
        assert!(!limiter.check_login("4.4.4.4").await.allowed);

        // Primary reset errors are logged and swallowed; fallback is cleared.
        limiter.reset("4.4.4.4", LimitKind::Login).await;
        assert!(limiter.check_login("4.4.4.4").await.allowed);
    }

    #[tokio::test]
    async fn stores_lists_fallback_last() {
        let limiter = RateLimiter::new(Arc::new(FailingStore), LimiterConfig::default());
        assert_eq!(limiter.stores().len(), 2);

        let memory_only = RateLimiter::in_memory(LimiterConfig::default());
        assert_eq!(memory_only.stores().len(), 1);
    }
}
