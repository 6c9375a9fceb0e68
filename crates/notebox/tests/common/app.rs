use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use axum::Router;
use notebox::{
    app_state::AppState,
    cache::{Cache, CacheError, NoopCache},
    notes::{Note, NoteStore},
};

/// Notes kept in memory, newest first on listing.
#[derive(Default)]
pub struct MemoryNoteStore {
    notes: Mutex<Vec<Note>>,
    failing: AtomicBool,
}

#[allow(dead_code)]
impl MemoryNoteStore {
    /// Makes every following call fail as if the database were gone.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl NoteStore for MemoryNoteStore {
    async fn create(&self, text: &str) -> Result<Note, sqlx::Error> {
        self.check()?;

        let mut notes = self.notes.lock().unwrap();
        let id = notes.iter().map(|n| n.id).max().unwrap_or(0) + 1;
        let now = chrono::Utc::now();
        let note = Note {
            id,
            text: text.to_string(),
            created_at: now,
            updated_at: now,
        };
        notes.push(note.clone());

        Ok(note)
    }

    async fn list(&self) -> Result<Vec<Note>, sqlx::Error> {
        self.check()?;

        let mut notes = self.notes.lock().unwrap().clone();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(notes)
    }

    async fn delete(&self, id: i32) -> Result<bool, sqlx::Error> {
        self.check()?;

        let mut notes = self.notes.lock().unwrap();
        let before = notes.len();
        notes.retain(|n| n.id != id);

        Ok(notes.len() != before)
    }
}

/// A cache that can be told to fail reads or writes.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

#[allow(dead_code)]
impl MemoryCache {
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}

#[async_trait::async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Timeout(Duration::from_millis(1)));
        }
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Timeout(Duration::from_millis(1)));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Timeout(Duration::from_millis(1)));
        }
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Clone)]
pub struct TestAppState {
    pub notes: Arc<dyn NoteStore>,
    pub cache: Arc<dyn Cache>,
}

impl AppState for TestAppState {
    fn version(&self) -> &'static str {
        "test-1.0.0"
    }

    fn notes(&self) -> &dyn NoteStore {
        self.notes.as_ref()
    }

    fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }
}

#[allow(dead_code)]
impl TestAppState {
    pub fn new(notes: Arc<MemoryNoteStore>, cache: Arc<MemoryCache>) -> Self {
        Self { notes, cache }
    }

    pub fn without_cache(notes: Arc<MemoryNoteStore>) -> Self {
        Self {
            notes,
            cache: Arc::new(NoopCache),
        }
    }
}

#[allow(dead_code)]
pub struct TestClient {
    client: reqwest::Client,
    base_url: String,
}

#[allow(dead_code)]
impl TestClient {
    pub fn new(port: u16) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://127.0.0.1:{port}"),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(self.url(path)).send().await
    }

    pub async fn delete(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.delete(self.url(path)).send().await
    }

    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> reqwest::Result<reqwest::Response> {
        self.client.post(self.url(path)).json(body).send().await
    }

    pub async fn post_raw(&self, path: &str, body: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
    }

    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, self.url(path))
    }
}

#[allow(dead_code)]
pub async fn spawn_test_server(router: Router) -> (TestClient, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to port");

    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    // Give server time to start
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    let client = TestClient::new(port);

    (client, handle)
}
