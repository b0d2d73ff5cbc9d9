//! SQLite-backed rate limit store.
//!
//! The cross-process source of truth. Each attempt runs read-then-write
//! inside an immediate transaction: the write lock is taken before the read,
//! so concurrent requests for the same client queue on the busy timeout
//! rather than both reading and then racing on the upgrade. The window
//! transition is always applied to the row as committed by the previous
//! winner.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{RunQueryDsl, SimpleAsyncConnection};

use super::{LimitKind, RateLimitStore, StoreResult};
use crate::config::LimitPolicy;
use crate::models::{NewRateLimitRow, RateLimitRow};
use crate::pool::SqlitePool;
use crate::schema::rate_limit_entries;
use crate::window::{self, LimitDecision, WindowState};

/// Diesel/SQLite rate limit store.
#[derive(Clone)]
pub struct SqliteRateLimitStore {
    pool: SqlitePool,
}

impl SqliteRateLimitStore {
    /// Create a store over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a store from a SQLite file path.
    pub fn from_path(path: &std::path::Path) -> Self {
        Self {
            pool: SqlitePool::from_path(path),
        }
    }

    /// Load the current state for a client, if a row exists.
    pub async fn get(
        &self,
        identifier: &str,
        kind: LimitKind,
    ) -> StoreResult<Option<WindowState>> {
        let mut conn = self.pool.get().await?;
        let row: Option<RateLimitRow> = rate_limit_entries::table
            .find((identifier, kind.as_str()))
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(|r| r.to_state()))
    }
}

#[async_trait]
impl RateLimitStore for SqliteRateLimitStore {
    async fn record_attempt(
        &self,
        identifier: &str,
        kind: LimitKind,
        policy: &LimitPolicy,
        now_ms: i64,
    ) -> StoreResult<LimitDecision> {
        let mut conn = self.pool.get().await?;
        let endpoint = kind.as_str();

        conn.batch_execute("BEGIN IMMEDIATE").await?;

        let result: Result<LimitDecision, diesel::result::Error> = async {
            let row: Option<RateLimitRow> = rate_limit_entries::table
                .find((identifier, endpoint))
                .first(&mut conn)
                .await
                .optional()?;

            let prev = row.as_ref().map(RateLimitRow::to_state);
            let (next, decision) = window::record_attempt(prev.as_ref(), policy, now_ms);

            let now_rfc3339 = Utc::now().to_rfc3339();
            let created_at = row
                .as_ref()
                .map(|r| r.created_at.clone())
                .unwrap_or_else(|| now_rfc3339.clone());

            diesel::replace_into(rate_limit_entries::table)
                .values(NewRateLimitRow {
                    identifier,
                    endpoint,
                    count: i32::try_from(next.count).unwrap_or(i32::MAX),
                    reset_time_ms: next.reset_time_ms,
                    first_attempt_ms: next.first_attempt_ms,
                    blocked: i32::from(next.blocked),
                    created_at: &created_at,
                    updated_at: &now_rfc3339,
                })
                .execute(&mut conn)
                .await?;

            Ok(decision)
        }
        .await;

        match result {
            Ok(decision) => {
                conn.batch_execute("COMMIT").await?;
                Ok(decision)
            }
            Err(e) => {
                let _ = conn.batch_execute("ROLLBACK").await;
                Err(e.into())
            }
        }
    }

    async fn reset(&self, identifier: &str, kind: LimitKind) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let deleted =
            diesel::delete(rate_limit_entries::table.find((identifier, kind.as_str())))
                .execute(&mut conn)
                .await?;
        Ok(deleted > 0)
    }

    async fn cleanup_expired(&self, now_ms: i64, kind: Option<LimitKind>) -> StoreResult<u64> {
        let mut conn = self.pool.get().await?;
        let deleted = match kind {
            Some(kind) => {
                diesel::delete(
                    rate_limit_entries::table
                        .filter(rate_limit_entries::reset_time_ms.lt(now_ms))
                        .filter(rate_limit_entries::endpoint.eq(kind.as_str())),
                )
                .execute(&mut conn)
                .await?
            }
            None => {
                diesel::delete(
                    rate_limit_entries::table
                        .filter(rate_limit_entries::reset_time_ms.lt(now_ms)),
                )
                .execute(&mut conn)
                .await?
            }
        };
        Ok(deleted as u64)
    }
}
