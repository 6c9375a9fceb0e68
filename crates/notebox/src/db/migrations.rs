//! File-based migration runner.
//!
//! Migrations are plain SQL files in a single directory. Each file is applied
//! at most once, in byte-wise lexicographic filename order, inside its own
//! transaction together with the row that records it as applied. Authors
//! control ordering through the filename prefix (`20240101000000_name.sql`,
//! `001_name.sql`, ...); there is no dependency analysis and no down
//! migrations.

use std::{
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;

/// File extension a directory entry needs to be picked up as a migration.
pub const MIGRATION_EXTENSION: &str = ".sql";

/// Error type for migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to read migrations directory {}: {source}", .path.display())]
    ReadDir { path: PathBuf, source: io::Error },

    #[error("failed to read migration file {name}: {source}")]
    ReadFile { name: String, source: io::Error },

    #[error("failed to create migrations table: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("failed to query migrations: {0}")]
    Query(#[source] sqlx::Error),

    #[error("failed to check if migration {name} exists: {source}")]
    Check { name: String, source: sqlx::Error },

    #[error("failed to begin transaction for migration {name}: {source}")]
    Begin { name: String, source: sqlx::Error },

    #[error("failed to execute migration {name}: {source}{}", RollbackNote(.rollback))]
    Execution {
        name: String,
        source: sqlx::Error,
        rollback: Option<sqlx::Error>,
    },

    #[error("failed to record migration {name}: {source}{}", RollbackNote(.rollback))]
    Record {
        name: String,
        source: sqlx::Error,
        rollback: Option<sqlx::Error>,
    },

    #[error("migration {name} is already recorded as applied{}", RollbackNote(.rollback))]
    Duplicate {
        name: String,
        rollback: Option<sqlx::Error>,
    },

    #[error("failed to commit migration {name}: {source}")]
    Commit { name: String, source: sqlx::Error },
}

impl MigrationError {
    /// The migration file this error is attached to, if any.
    pub fn migration_name(&self) -> Option<&str> {
        match self {
            Self::ReadFile { name, .. }
            | Self::Check { name, .. }
            | Self::Begin { name, .. }
            | Self::Execution { name, .. }
            | Self::Record { name, .. }
            | Self::Duplicate { name, .. }
            | Self::Commit { name, .. } => Some(name),
            Self::ReadDir { .. } | Self::Schema(_) | Self::Query(_) => None,
        }
    }
}

struct RollbackNote<'a>(&'a Option<sqlx::Error>);

impl fmt::Display for RollbackNote<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(rollback) => write!(f, " (rollback failed: {rollback})"),
            None => Ok(()),
        }
    }
}

/// A row of the tracking table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MigrationRecord {
    pub name: String,
    pub applied_at: chrono::DateTime<chrono::Utc>,
}

/// A migration read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub name: String,
    pub sql: String,
}

/// The persistence side of the runner: the tracking table plus the ability to
/// apply one migration atomically.
///
/// [`PgMigrationStore`](super::PgMigrationStore) is the production
/// implementation.
#[async_trait::async_trait]
pub trait MigrationStore: Send + Sync {
    /// Create the tracking table if it does not exist. Safe to call repeatedly.
    async fn ensure_schema(&self) -> Result<(), MigrationError>;

    async fn is_applied(&self, name: &str) -> Result<bool, MigrationError>;

    /// All applied migrations, oldest `applied_at` first.
    async fn applied(&self) -> Result<Vec<MigrationRecord>, MigrationError>;

    /// Execute the migration SQL and record it as applied, both in one
    /// transaction. On error nothing of the migration is left behind.
    async fn apply(&self, migration: &MigrationFile) -> Result<(), MigrationError>;
}

/// What a call to [`Migrator::run`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

/// Applied and pending migrations, as shown by the `status` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied: Vec<MigrationRecord>,
    pub pending: Vec<String>,
}

impl MigrationStatus {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Write the two-section, human readable report.
    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Applied migrations:")?;
        writeln!(out, "===================")?;
        for record in &self.applied {
            writeln!(
                out,
                "✓ {} (applied: {})",
                record.name,
                record.applied_at.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        if self.applied.is_empty() {
            writeln!(out, "No migrations applied yet")?;
        }

        writeln!(out)?;
        writeln!(out, "Pending migrations:")?;
        writeln!(out, "==================")?;
        for name in &self.pending {
            writeln!(out, "✗ {name}")?;
        }
        if self.pending.is_empty() {
            writeln!(out, "No pending migrations")?;
        }

        Ok(())
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.render(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

/// Migration runner over a directory of SQL files.
#[derive(Debug, Clone)]
pub struct Migrator<S> {
    store: S,
    dir: PathBuf,
}

impl<S: MigrationStore> Migrator<S> {
    pub fn new(store: S, dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            dir: dir.into(),
        }
    }

    /// Migration filenames in the directory, sorted ascending.
    ///
    /// Subdirectories and files without the `.sql` extension are ignored.
    pub fn discover(&self) -> Result<Vec<String>, MigrationError> {
        discover(&self.dir)
    }

    /// Apply every pending migration in order.
    ///
    /// Stops at the first failure; files sorted after the failing one are not
    /// attempted.
    #[tracing::instrument(name = "migrations.run", skip(self), fields(dir = %self.dir.display()), err)]
    pub async fn run(&self) -> Result<MigrationReport, MigrationError> {
        self.store.ensure_schema().await?;

        let mut report = MigrationReport::default();

        for name in self.discover()? {
            if self.store.is_applied(&name).await? {
                tracing::info!(migration = %name, "Migration already applied");
                report.skipped.push(name);
                continue;
            }

            let sql = std::fs::read_to_string(self.dir.join(&name)).map_err(|source| {
                MigrationError::ReadFile {
                    name: name.clone(),
                    source,
                }
            })?;

            tracing::debug!(migration = %name, "Running migration");
            self.store.apply(&MigrationFile { name: name.clone(), sql }).await?;
            tracing::info!(migration = %name, "Applied migration");

            report.applied.push(name);
        }

        Ok(report)
    }

    /// Read-only view of applied and pending migrations.
    ///
    /// The tracking table is still created if missing so status works against
    /// a fresh database.
    pub async fn status(&self) -> Result<MigrationStatus, MigrationError> {
        self.store.ensure_schema().await?;

        let applied = self.store.applied().await?;

        let mut pending = Vec::new();
        for name in self.discover()? {
            if !self.store.is_applied(&name).await? {
                pending.push(name);
            }
        }

        Ok(MigrationStatus { applied, pending })
    }
}

/// List migration filenames in `dir`, sorted byte-wise.
pub fn discover(dir: &Path) -> Result<Vec<String>, MigrationError> {
    let read_dir_err = |source| MigrationError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_dir_err)? {
        let entry = entry.map_err(read_dir_err)?;

        if entry.file_type().map_err(read_dir_err)?.is_dir() {
            continue;
        }

        // Non UTF-8 names can't be stored in the tracking table anyway.
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!(file = ?entry.file_name(), "Skipping migration with non UTF-8 name");
            continue;
        };

        if name.ends_with(MIGRATION_EXTENSION) {
            names.push(name);
        }
    }

    names.sort_unstable();
    Ok(names)
}
