//! Loading roadmap documents from outside the store: remote URLs and local files.

use std::env;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use roadmap_core::import::parse_document;

use crate::error::SourceError;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub timeout: Duration,
}

impl FetchConfig {
    /// Reads `ROADMAP_FETCH_TIMEOUT_SECS`, falling back to 30 seconds.
    #[must_use]
    pub fn from_env() -> Self {
        let secs = env::var("ROADMAP_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
        Self {
            timeout: Duration::from_secs(secs),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

#[derive(Default)]
struct InFlight {
    generation: u64,
    token: Option<CancellationToken>,
}

/// Fetches roadmap documents over HTTP.
///
/// Starting a fetch cancels the one still in flight from the same fetcher.
/// A cancelled fetch resolves to `Ok(None)`: no data, no error.
pub struct RoadmapFetcher {
    client: Client,
    in_flight: Mutex<InFlight>,
}

impl RoadmapFetcher {
    /// # Errors
    ///
    /// Returns `SourceError::Http` if the HTTP client cannot be built.
    pub fn new(config: &FetchConfig) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            in_flight: Mutex::new(InFlight::default()),
        })
    }

    /// Fetch and decode the JSON document at `url`.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::InvalidUrl` for unusable URLs,
    /// `SourceError::HttpStatus` for non-2xx responses, `SourceError::Http`
    /// for transport failures and `SourceError::Parse` for non-JSON bodies.
    pub async fn fetch(&self, url: &str) -> Result<Option<Value>, SourceError> {
        let (generation, token) = self.begin();

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => None,
            result = self.request(url) => Some(result),
        };
        self.finish(generation);

        match outcome {
            None => {
                debug!(url, "roadmap fetch cancelled");
                Ok(None)
            }
            Some(Ok(doc)) => {
                debug!(url, "roadmap fetched");
                Ok(Some(doc))
            }
            Some(Err(err)) => {
                warn!(url, error = %err, "roadmap fetch failed");
                Err(err)
            }
        }
    }

    /// Cancel the fetch in flight, if any.
    pub fn cancel(&self) {
        let mut guard = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = guard.token.take() {
            token.cancel();
        }
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let mut guard = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = guard.token.replace(token.clone()) {
            previous.cancel();
        }
        guard.generation += 1;
        (guard.generation, token)
    }

    fn finish(&self, generation: u64) {
        let mut guard = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.generation == generation {
            guard.token = None;
        }
    }

    async fn request(&self, raw_url: &str) -> Result<Value, SourceError> {
        let url = parse_url(raw_url)?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::HttpStatus(response.status()));
        }
        let body = response.text().await?;
        Ok(parse_document(&body)?)
    }
}

fn parse_url(raw: &str) -> Result<Url, SourceError> {
    let invalid = |reason: String| SourceError::InvalidUrl {
        url: raw.to_owned(),
        reason,
    };
    let url = Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {other}"))),
    }
}

/// Read and decode a roadmap document from a `.json` file.
///
/// # Errors
///
/// Returns `SourceError::NotJson` for other extensions, `SourceError::Io` if
/// the file cannot be read and `SourceError::Parse` if it is not JSON.
pub async fn load_document_file(path: &Path) -> Result<Value, SourceError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(SourceError::NotJson(path.display().to_string()));
    }
    let text = tokio::fs::read_to_string(path).await?;
    Ok(parse_document(&text)?)
}
