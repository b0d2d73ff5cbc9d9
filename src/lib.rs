//! floodgate - allow/deny rate limiting for login and admin endpoints.
//!
//! Sits in front of authentication and admin-mutation route handlers and
//! decides, per client identifier, whether a request is allowed. State lives
//! in a SQLite table (the cross-process source of truth) with a bounded
//! in-memory fallback that takes over when the database path fails, so an
//! outage degrades consistency instead of blocking requests.
//!
//! ```no_run
//! use std::sync::Arc;
//! use floodgate::{LimiterConfig, RateLimiter, SqliteRateLimitStore};
//!
//! # async fn example() -> Result<(), floodgate::StoreError> {
//! floodgate::migrations::run_migrations("rate_limits.db").await?;
//! let store = Arc::new(SqliteRateLimitStore::from_path("rate_limits.db".as_ref()));
//! let limiter = RateLimiter::new(store, LimiterConfig::default());
//! let sweeper = limiter.spawn_sweeper();
//!
//! let decision = limiter.check_login("203.0.113.7").await;
//! if !decision.allowed {
//!     // respond 429 with Retry-After: decision.retry_after_secs
//! }
//! # sweeper.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod limiter;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod schema;
pub mod store;
pub mod sweeper;
pub mod window;

pub use config::{FallbackConfig, LimitPolicy, LimiterConfig, WindowPolicy};
pub use limiter::{RateLimiter, SharedStore};
pub use store::{
    InMemoryRateLimitStore, LimitKind, RateLimitStore, SqliteRateLimitStore, StoreError,
    StoreResult,
};
pub use sweeper::CleanupSweeper;
pub use window::{LimitDecision, WindowState};
