use serde::{Deserialize, Serialize};
use sqlx::PgPool;

pub mod handlers;

/// Cache key holding the serialized note listing.
pub const NOTES_CACHE_KEY: &str = "notes:all";

/// How long a cached listing stays valid.
pub const NOTES_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Note {
    pub id: i32,
    pub text: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteCreateRequest {
    /// A missing or `null` text is treated like an empty one.
    pub text: Option<String>,
}

/// Persistence for notes.
#[async_trait::async_trait]
pub trait NoteStore: Send + Sync + 'static {
    async fn create(&self, text: &str) -> Result<Note, sqlx::Error>;

    /// All notes, newest first.
    async fn list(&self) -> Result<Vec<Note>, sqlx::Error>;

    /// Returns whether a note was deleted.
    async fn delete(&self, id: i32) -> Result<bool, sqlx::Error>;
}

#[derive(Debug, Clone)]
pub struct PgNoteStore {
    pool: PgPool,
}

impl PgNoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl NoteStore for PgNoteStore {
    async fn create(&self, text: &str) -> Result<Note, sqlx::Error> {
        sqlx::query_as::<_, Note>(
            "INSERT INTO notes (text) VALUES ($1) RETURNING id, text, created_at, updated_at",
        )
        .bind(text)
        .fetch_one(&self.pool)
        .await
    }

    async fn list(&self) -> Result<Vec<Note>, sqlx::Error> {
        sqlx::query_as::<_, Note>(
            "SELECT id, text, created_at, updated_at FROM notes ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn delete(&self, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
