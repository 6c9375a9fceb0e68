use sqlx::{PgConnection, PgPool};

use super::migrations::{MigrationError, MigrationFile, MigrationRecord, MigrationStore};

/// Tracking table backed by PostgreSQL.
///
/// Each migration runs in its own transaction: the file's SQL batch and the
/// `INSERT` into `migrations` either both commit or both roll back, so a crash
/// mid-migration leaves it pending for the next run.
#[derive(Debug, Clone)]
pub struct PgMigrationStore {
    pool: PgPool,
}

impl PgMigrationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn record_applied(conn: &mut PgConnection, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO migrations (name) VALUES ($1)")
        .bind(name)
        .execute(conn)
        .await?;

    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

#[async_trait::async_trait]
impl MigrationStore for PgMigrationStore {
    async fn ensure_schema(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "
            CREATE TABLE IF NOT EXISTS migrations (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(MigrationError::Schema)?;

        Ok(())
    }

    async fn is_applied(&self, name: &str) -> Result<bool, MigrationError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM migrations WHERE name = $1)")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|source| MigrationError::Check {
                name: name.to_string(),
                source,
            })
    }

    async fn applied(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        sqlx::query_as::<_, MigrationRecord>(
            "SELECT name, applied_at FROM migrations ORDER BY applied_at, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(MigrationError::Query)
    }

    async fn apply(&self, migration: &MigrationFile) -> Result<(), MigrationError> {
        let name = migration.name.clone();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|source| MigrationError::Begin {
                name: name.clone(),
                source,
            })?;

        if let Err(source) = sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(&migration.sql)).await {
            let rollback = tx.rollback().await.err();
            return Err(MigrationError::Execution {
                name,
                source,
                rollback,
            });
        }

        if let Err(source) = record_applied(&mut tx, &name).await {
            let rollback = tx.rollback().await.err();
            return Err(if is_unique_violation(&source) {
                MigrationError::Duplicate { name, rollback }
            } else {
                MigrationError::Record {
                    name,
                    source,
                    rollback,
                }
            });
        }

        tx.commit()
            .await
            .map_err(|source| MigrationError::Commit { name, source })
    }
}
