#![forbid(unsafe_code)]

pub mod app_services;
pub mod debounce;
pub mod error;
pub mod progress_service;
pub mod sources;

pub use roadmap_core::Clock;

pub use app_services::AppServices;
pub use debounce::Debouncer;
pub use error::{AppServicesError, ProgressServiceError, SourceError};
pub use progress_service::{DEFAULT_NAMESPACE, ProgressService, RoadmapOverview, StorageKeys};
pub use sources::{FetchConfig, RoadmapFetcher, load_document_file};
