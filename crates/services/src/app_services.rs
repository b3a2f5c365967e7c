use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::progress_service::{ProgressService, StorageKeys};
use crate::sources::{FetchConfig, RoadmapFetcher};

/// Assembles app-facing services over one storage backend and namespace.
#[derive(Clone)]
pub struct AppServices {
    progress: Arc<ProgressService>,
    fetcher: Arc<RoadmapFetcher>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the HTTP
    /// client cannot be built.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        namespace: &str,
        fetch: &FetchConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(&storage, clock, namespace, fetch)
    }

    /// Build services over an existing storage handle.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Source` if the HTTP client cannot be built.
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        namespace: &str,
        fetch: &FetchConfig,
    ) -> Result<Self, AppServicesError> {
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.kv),
            StorageKeys::namespaced(namespace),
        ));
        let fetcher = Arc::new(RoadmapFetcher::new(fetch)?);
        Ok(Self { progress, fetcher })
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn fetcher(&self) -> Arc<RoadmapFetcher> {
        Arc::clone(&self.fetcher)
    }
}
