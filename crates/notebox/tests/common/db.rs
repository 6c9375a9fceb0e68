//! Throwaway PostgreSQL databases for tests.
//!
//! Tests that need a real database call [`setup_test_db`] and return early
//! when it yields `None`, which happens when `DATABASE_URL` is not set.
#![allow(dead_code)]

use std::sync::{Arc, LazyLock};

use sqlx::{Connection as _, PgConnection, PgPool, postgres::PgPoolOptions};
use tokio::sync::Mutex;
use uuid::Uuid;

pub static DB_MUTEX: LazyLock<Arc<Mutex<()>>> = LazyLock::new(|| Arc::new(Mutex::new(())));

pub fn base_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

pub fn test_db_url(base_url: &str, db_name: &str) -> String {
    let (without_query, query) = match base_url.split_once('?') {
        Some((url, query)) => (url, Some(query)),
        None => (base_url, None),
    };

    // Remove any existing database name from the URL and append our test db name
    let url_without_db = without_query
        .rfind('/')
        .filter(|idx| !without_query[..*idx].ends_with('/'))
        .map_or(without_query, |idx| &without_query[..idx]);

    match query {
        Some(query) => format!("{url_without_db}/{db_name}?{query}"),
        None => format!("{url_without_db}/{db_name}"),
    }
}

pub struct TestDbGuard {
    base_url: String,
    db_name: String,
}

impl Drop for TestDbGuard {
    fn drop(&mut self) {
        let base_url = self.base_url.clone();
        let db_name = self.db_name.clone();
        // Run on a fresh thread to avoid the runtime-in-runtime issue
        let _ = std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                if let Ok(mut conn) = PgConnection::connect(&base_url).await {
                    let _ = sqlx::raw_sql(&format!(
                        "DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE)"
                    ))
                    .execute(&mut conn)
                    .await;
                    let _ = conn.close().await;
                }
            });
        })
        .join();
    }
}

/// Creates an empty database and returns a pool connected to it.
pub async fn setup_test_db() -> Option<(PgPool, TestDbGuard)> {
    let Some(base_url) = base_url() else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
        return None;
    };

    let db_name = format!("notebox_test_{}", Uuid::new_v4().simple());

    {
        let _lock = DB_MUTEX.lock().await;
        let mut conn = PgConnection::connect(&base_url)
            .await
            .expect("Failed to connect to DATABASE_URL");
        sqlx::raw_sql(&format!("CREATE DATABASE \"{db_name}\""))
            .execute(&mut conn)
            .await
            .expect("Failed to create test database");
        conn.close().await.unwrap();
    }

    let guard = TestDbGuard {
        base_url: base_url.clone(),
        db_name: db_name.clone(),
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&test_db_url(&base_url, &db_name))
        .await
        .expect("Failed to connect to test database");

    Some((pool, guard))
}

pub async fn table_exists(pool: &PgPool, table: &str) -> bool {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_schema = 'public' AND table_name = $1)",
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn recorded_migrations(pool: &PgPool) -> Vec<String> {
    sqlx::query_scalar::<_, String>("SELECT name FROM migrations ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap()
}
