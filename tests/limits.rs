//! End-to-end limiter tests
//!
//! Exercises the full stack: migrations, the SQLite primary store, the
//! in-memory fallback under a simulated database outage, and the cleanup
//! sweeper running against both stores.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use floodgate::{
    migrations, CleanupSweeper, InMemoryRateLimitStore, LimitDecision, LimitKind, LimitPolicy,
    LimiterConfig, RateLimiter, RateLimitStore, SqliteRateLimitStore, StoreError, StoreResult,
    WindowPolicy,
};

/// Install a subscriber once per test binary so the limiter's fallback and
/// sweep logging shows up under `RUST_LOG`.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "floodgate=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .init();
    });
}

async fn sqlite_limiter(config: LimiterConfig) -> (TempDir, RateLimiter) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("limits.db");
    migrations::run_migrations(&db_path.display().to_string())
        .await
        .unwrap();
    let store = Arc::new(SqliteRateLimitStore::from_path(&db_path));
    (dir, RateLimiter::new(store, config))
}

#[tokio::test]
async fn login_scenario_through_sqlite() {
    let (_dir, limiter) = sqlite_limiter(LimiterConfig::default()).await;

    // Client "1.2.3.4" hammers the login endpoint within one second.
    for expected in 1..=5u32 {
        let decision = limiter.check_login("1.2.3.4").await;
        assert!(decision.allowed);
        assert_eq!(decision.current_count, expected);
    }

    let sixth = limiter.check_login("1.2.3.4").await;
    assert!(!sixth.allowed);
    assert_eq!(sixth.current_count, 6);
    assert!(sixth.retry_after_secs.unwrap() > 0);

    // An unrelated client is unaffected.
    assert!(limiter.check_login("8.8.8.8").await.allowed);
}

#[tokio::test]
async fn admin_scenario_through_sqlite() {
    let (_dir, limiter) = sqlite_limiter(LimiterConfig::default()).await;

    for _ in 0..10 {
        assert!(limiter.check_admin("10.1.1.1").await.allowed);
    }
    let denied = limiter.check_admin("10.1.1.1").await;
    assert!(!denied.allowed);
    assert_eq!(denied.current_count, 11);
}

#[tokio::test]
async fn admin_reset_clears_both_stores() {
    let (_dir, limiter) = sqlite_limiter(LimiterConfig::default()).await;

    for _ in 0..6 {
        limiter.check_login("2.3.4.5").await;
    }
    assert!(!limiter.check_login("2.3.4.5").await.allowed);

    limiter.reset("2.3.4.5", LimitKind::Login).await;
    let fresh = limiter.check_login("2.3.4.5").await;
    assert!(fresh.allowed);
    assert_eq!(fresh.current_count, 1);
}

/// Primary store that fails every call, simulating a database outage.
struct OutageStore;

#[async_trait]
impl RateLimitStore for OutageStore {
    async fn record_attempt(
        &self,
        _identifier: &str,
        _kind: LimitKind,
        _policy: &LimitPolicy,
        _now_ms: i64,
    ) -> StoreResult<LimitDecision> {
        Err(StoreError::Database("disk I/O error".into()))
    }

    async fn reset(&self, _identifier: &str, _kind: LimitKind) -> StoreResult<bool> {
        Err(StoreError::Database("disk I/O error".into()))
    }

    async fn cleanup_expired(&self, _now_ms: i64, _kind: Option<LimitKind>) -> StoreResult<u64> {
        Err(StoreError::Database("disk I/O error".into()))
    }
}

#[tokio::test]
async fn outage_falls_back_without_surfacing_errors() {
    init_tracing();
    let limiter = RateLimiter::new(Arc::new(OutageStore), LimiterConfig::default());

    // Callers always get a decision; denial kicks in at the usual threshold.
    for expected in 1..=5u32 {
        let decision = limiter.check_login("7.7.7.7").await;
        assert!(decision.allowed);
        assert_eq!(decision.current_count, expected);
    }
    assert!(!limiter.check_login("7.7.7.7").await.allowed);

    // All state ended up in the fallback store.
    assert!(limiter
        .fallback()
        .get("7.7.7.7", LimitKind::Login)
        .await
        .is_some());
}

#[tokio::test]
async fn sweeper_cleans_both_stores() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("limits.db");
    migrations::run_migrations(&db_path.display().to_string())
        .await
        .unwrap();
    let sqlite = Arc::new(SqliteRateLimitStore::from_path(&db_path));
    let memory = Arc::new(InMemoryRateLimitStore::new());

    // Short window so the records expire immediately.
    let policy = LimitPolicy {
        short: WindowPolicy {
            max_attempts: 5,
            window: Duration::from_millis(10),
        },
        long: None,
    };
    let now_ms = chrono::Utc::now().timestamp_millis() - 60_000;
    sqlite
        .record_attempt("expired", LimitKind::Login, &policy, now_ms)
        .await
        .unwrap();
    memory
        .record_attempt("expired", LimitKind::Login, &policy, now_ms)
        .await
        .unwrap();

    let stores: Vec<Arc<dyn RateLimitStore>> = vec![sqlite.clone(), memory.clone()];
    let sweeper = CleanupSweeper::start(stores, Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(120)).await;
    sweeper.shutdown().await;

    assert!(sqlite
        .get("expired", LimitKind::Login)
        .await
        .unwrap()
        .is_none());
    assert!(memory.get("expired", LimitKind::Login).await.is_none());
}
