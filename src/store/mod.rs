//! Pluggable storage backends for rate limit state.
//!
//! The SQLite store is the cross-process source of truth; the in-memory
//! store is the bounded fallback used when the database path fails. Both
//! apply the same transition logic from [`crate::window`].

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::config::LimitPolicy;
use crate::window::LimitDecision;

pub use memory::InMemoryRateLimitStore;
pub use sqlite::SqliteRateLimitStore;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from rate limit store operations.
///
/// Limit-exceeded is not an error: it is a normal denied decision. Every
/// variant here is a transient infrastructure failure that the limiter
/// recovers from by switching to the fallback store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<diesel::ConnectionError> for StoreError {
    fn from(e: diesel::ConnectionError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Endpoint category a limit applies to. Stored in the `endpoint` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    Login,
    Admin,
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::Login => "login",
            LimitKind::Admin => "admin",
        }
    }
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for rate limit storage backends.
///
/// Implementations must be thread-safe. `record_attempt` must apply the
/// window transition atomically per (identifier, kind) pair: at most one
/// winning writer per window under concurrent requests.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one attempt and return the allow/deny decision for it.
    async fn record_attempt(
        &self,
        identifier: &str,
        kind: LimitKind,
        policy: &LimitPolicy,
        now_ms: i64,
    ) -> StoreResult<LimitDecision>;

    /// Drop the record for a client, ending any active window or block.
    /// Returns whether a record existed.
    async fn reset(&self, identifier: &str, kind: LimitKind) -> StoreResult<bool>;

    /// Delete expired records, optionally scoped to one endpoint category.
    /// Returns the number of records removed.
    async fn cleanup_expired(&self, now_ms: i64, kind: Option<LimitKind>) -> StoreResult<u64>;
}
