use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::warn;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable string-keyed store.
///
/// Every call completes its write before returning; adapters never queue.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write all entries atomically: either every key is updated or none is.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), StorageError>;

    /// Remove all keys atomically. Missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove_many(&self, keys: &[String]) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.set_many(&[(key.to_owned(), value)]).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remove_many(&[key.to_owned()]).await
    }
}

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set_many(&self, entries: &[(String, String)]) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        for (key, value) in entries {
            guard.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        for key in keys {
            guard.remove(key);
        }
        Ok(())
    }
}

/// Typed JSON access on top of a [`KeyValueStore`].
///
/// A stored value that is not valid JSON, or does not decode into the
/// requested type, reads as absent. Corruption degrades to "no data" rather
/// than failing the caller.
#[derive(Clone)]
pub struct JsonStore {
    kv: Arc<dyn KeyValueStore>,
}

impl JsonStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Read and decode the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only when the backend itself fails.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.kv.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(key, error = %err, "discarding unreadable stored value");
                Ok(None)
            }
        }
    }

    /// Encode and store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if encoding fails, or a backend error.
    pub async fn write<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        self.kv.set(key, encode(value)?).await
    }

    /// Store two values in one atomic write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if encoding fails, or a backend error.
    pub async fn write_pair<A: Serialize + ?Sized, B: Serialize + ?Sized>(
        &self,
        first: (&str, &A),
        second: (&str, &B),
    ) -> Result<(), StorageError> {
        let entries = [
            (first.0.to_owned(), encode(first.1)?),
            (second.0.to_owned(), encode(second.1)?),
        ];
        self.kv.set_many(&entries).await
    }

    /// Remove every key in one atomic write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend fails.
    pub async fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        let keys: Vec<String> = keys.iter().map(|k| (*k).to_owned()).collect();
        self.kv.remove_many(&keys).await
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Holds the key-value backend behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(InMemoryStore::new()),
        }
    }

    #[must_use]
    pub fn json(&self) -> JsonStore {
        JsonStore::new(Arc::clone(&self.kv))
    }
}
