use std::sync::Arc;

use crate::{cache::Cache, notes::NoteStore};

/// A trait representing the state the HTTP handlers need.
///
/// The state is cloned for each request, so it should be cheap to clone
/// (usually by wrapping the collaborators in `Arc`). The store and cache are
/// handed out as trait objects, which is what lets tests swap in in-memory
/// implementations.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use notebox::app_state::AppState;
/// use notebox::cache::{Cache, NoopCache};
/// use notebox::notes::NoteStore;
///
/// #[derive(Clone)]
/// struct MyAppState {
///     notes: Arc<dyn NoteStore>,
/// }
///
/// impl AppState for MyAppState {
///     fn version(&self) -> &str {
///         "1.0.0"
///     }
///
///     fn notes(&self) -> &dyn NoteStore {
///         self.notes.as_ref()
///     }
///
///     fn cache(&self) -> &dyn Cache {
///         &NoopCache
///     }
/// }
/// ```
pub trait AppState: Clone + Send + Sync + 'static {
    /// Returns the version string for the application.
    fn version(&self) -> &str;

    /// Returns the note store shared across all requests.
    fn notes(&self) -> &dyn NoteStore;

    /// Returns the listing cache. Never absent: a disabled cache is a
    /// [`NoopCache`](crate::cache::NoopCache).
    fn cache(&self) -> &dyn Cache;
}

/// The state used by the `notebox-server` binary.
#[derive(Clone)]
pub struct ServiceState {
    version: &'static str,
    notes: Arc<dyn NoteStore>,
    cache: Arc<dyn Cache>,
}

impl ServiceState {
    pub fn new(notes: Arc<dyn NoteStore>, cache: Arc<dyn Cache>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            notes,
            cache,
        }
    }
}

impl AppState for ServiceState {
    fn version(&self) -> &str {
        self.version
    }

    fn notes(&self) -> &dyn NoteStore {
        self.notes.as_ref()
    }

    fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }
}
