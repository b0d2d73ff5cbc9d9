//! Database migrations using diesel_migrations.
//!
//! Embeds migrations at compile time and runs them via a blocking task so
//! they work alongside async connections.

use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use crate::store::{StoreError, StoreResult};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run pending migrations for a SQLite database URL.
pub async fn run_migrations(database_url: &str) -> StoreResult<()> {
    // Strip sqlite: prefix if present - diesel expects just the file path
    let url = database_url
        .strip_prefix("sqlite:")
        .unwrap_or(database_url)
        .to_string();

    tokio::task::spawn_blocking(move || {
        let mut conn = diesel::SqliteConnection::establish(&url)?;

        let migrations = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        for migration in &migrations {
            info!("Applied migration: {}", migration);
        }

        if migrations.is_empty() {
            info!("No pending migrations");
        }

        Ok(())
    })
    .await
    .map_err(|e| StoreError::Unavailable(e.to_string()))?
}
