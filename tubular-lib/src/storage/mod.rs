//! Local state store for grid preferences and session data.
//!
//! Backends store raw JSON strings under flat keys. [`StateStore`] wraps a
//! backend with typed serialization and is what grids and sessions hold.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use sqlite::default_db_path;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;

/// Backend trait for local state storage.
///
/// Access is synchronous; implementations must be cheap enough to call from
/// inside controller operations.
pub trait LocalStore: Send + Sync {
    /// Get the raw JSON text stored under a key.
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store raw JSON text under a key.
    fn set_raw(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Get all keys starting with a prefix.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Typed local state store.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct StateStore {
    backend: Arc<dyn LocalStore>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore").finish_non_exhaustive()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl StateStore {
    /// Create a store over the given backend.
    pub fn new(backend: impl LocalStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Create a store over a shared backend.
    pub fn from_arc(backend: Arc<dyn LocalStore>) -> Self {
        Self { backend }
    }

    /// Create a process-local store that forgets everything on drop.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Get a typed value for a key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.backend.get_raw(key)? {
            Some(text) => Ok(Some(
                serde_json::from_str(&text).map_err(StorageError::Deserialization)?,
            )),
            None => Ok(None),
        }
    }

    /// Get a typed value for a key, returning a default if not found.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, StorageError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Set a typed value for a key.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let text = serde_json::to_string(value).map_err(StorageError::Serialization)?;
        self.backend.set_raw(key, text)
    }

    /// Delete a key.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.backend.remove(key)
    }

    /// Get all keys matching a prefix.
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.backend.keys_with_prefix(prefix)
    }
}
