//! Diesel record types for the `rate_limit_entries` table.

use diesel::prelude::*;

use crate::schema;
use crate::window::WindowState;

/// Rate limit entry loaded from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::rate_limit_entries)]
#[diesel(primary_key(identifier, endpoint))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RateLimitRow {
    pub identifier: String,
    pub endpoint: String,
    pub count: i32,
    pub reset_time_ms: i64,
    pub first_attempt_ms: i64,
    pub blocked: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl RateLimitRow {
    /// Convert the persisted row into window state for the transition logic.
    pub fn to_state(&self) -> WindowState {
        WindowState {
            count: self.count.max(0) as u32,
            first_attempt_ms: self.first_attempt_ms,
            reset_time_ms: self.reset_time_ms,
            blocked: self.blocked != 0,
        }
    }
}

/// New or replacement rate limit entry for upsert.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::rate_limit_entries)]
pub struct NewRateLimitRow<'a> {
    pub identifier: &'a str,
    pub endpoint: &'a str,
    pub count: i32,
    pub reset_time_ms: i64,
    pub first_attempt_ms: i64,
    pub blocked: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}
