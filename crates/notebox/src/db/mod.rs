//! Database utilities: the connection pool and the migration runner.
//!
//! # Migration File Format
//!
//! Migrations are plain SQL files stored in a `migrations/` directory next to
//! where the process is started. Any regular file ending in `.sql` is a
//! migration; it may contain several statements. Files are applied in
//! byte-wise filename order, so prefix them with a zero padded number or a
//! timestamp:
//!
//! - `20240101000000_create_notes.sql`
//! - `20240215093000_add_notes_index.sql`
//!
//! # Example
//!
//! ```rust,no_run
//! use notebox::db::{Migrator, PgMigrationStore};
//!
//! # async fn example(pool: sqlx::PgPool) -> Result<(), notebox::db::MigrationError> {
//! let migrator = Migrator::new(PgMigrationStore::new(pool), "migrations");
//! let report = migrator.run().await?;
//! println!("applied {} migrations", report.applied.len());
//! # Ok(())
//! # }
//! ```

mod migrations;
mod tracker;

pub use migrations::*;
pub use tracker::PgMigrationStore;

use sqlx::{PgPool, postgres::PgPoolOptions};
use thiserror::Error;

use crate::config::{ConfigError, DatabaseConfig};

/// Default location of the migration files, relative to the working directory.
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),
}

/// Open the pool and make sure the database answers.
#[tracing::instrument(name = "db.connect", skip(config), err)]
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, ConnectError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(config.connect_options()?)
        .await
        .map_err(ConnectError::Connect)?;

    if config.url.is_some() {
        tracing::info!("Database connected successfully using DATABASE_URL");
    } else {
        tracing::info!(
            host = %config.host,
            port = config.port,
            user = %config.user,
            dbname = %config.name,
            "Database connected successfully"
        );
    }

    Ok(pool)
}

/// Close `pool`, waiting at most `timeout` for checked out connections to be
/// returned. Returns `false` if the wait was cut short.
pub async fn close_pool(pool: &PgPool, timeout: std::time::Duration) -> bool {
    if tokio::time::timeout(timeout, pool.close()).await.is_ok() {
        tracing::info!("Database connections closed");
        true
    } else {
        tracing::warn!(?timeout, "Gave up waiting for database connections to close");
        false
    }
}

/// Apply all pending migrations found in `dir` against `pool`.
pub async fn run_migrations(
    pool: &PgPool,
    dir: impl Into<std::path::PathBuf>,
) -> Result<MigrationReport, MigrationError> {
    Migrator::new(PgMigrationStore::new(pool.clone()), dir)
        .run()
        .await
}
