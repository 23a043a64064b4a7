//! API handlers for CHS Archive.

pub mod file;
pub mod health;

pub use file::*;
pub use health::*;

use std::sync::Arc;

use crate::file::FileService;
use crate::web::error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// File service (store and download counters).
    pub files: Arc<FileService>,
    /// Base URL for generated links. `None` derives it from the request.
    pub public_base_url: Option<String>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(files: FileService) -> Self {
        Self {
            files: Arc::new(files),
            public_base_url: None,
        }
    }

    /// Use a fixed base URL for generated links.
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.public_base_url = (!base_url.is_empty()).then_some(base_url);
        self
    }
}

/// Run filesystem work on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            tracing::error!("Blocking task failed: {}", e);
            ApiError::internal("An internal error occurred")
        })?
        .map_err(ApiError::from)
}
