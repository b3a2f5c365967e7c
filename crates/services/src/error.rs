//! Shared error types for the services crate.

use thiserror::Error;

use roadmap_core::import::ImportError;
use roadmap_core::model::ItemId;
use roadmap_core::stats::StatsError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("no item {0} in the current roadmap")]
    UnknownItem(ItemId),
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while loading roadmap documents from files or URLs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    #[error("invalid roadmap url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("roadmap request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0} is not a .json file")]
    NotJson(String),
    #[error("failed to read roadmap file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ImportError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Source(#[from] SourceError),
}
