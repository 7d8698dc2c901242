//! Credential store module for durable key/value persistence.
//!
//! This module defines the `CredentialStore` trait, a string key/value
//! contract modelled on browser local storage, along with an in-memory
//! implementation and a file-backed implementation with atomic writes.
//!
//! Only the integration registry talks to a store directly. Everything
//! else goes through `IntegrationRegistry`.

pub mod file;

pub use file::FileStore;

use std::collections::BTreeMap;
use std::io;
use std::sync::RwLock;

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO error while reading or writing the backing file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The backing document could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A writer panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable key/value persistence for connection state.
///
/// Values are opaque strings. Every write replaces the full value stored
/// under the key; there is no compare-and-swap, so the last writer wins.
pub trait CredentialStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> StoreResult<()>;
}

/// In-memory store, used for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    /// Returns true if no keys are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryStore {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        let items = self.items.read().map_err(|_| StoreError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut items = self.items.write().map_err(|_| StoreError::Poisoned)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        let mut items = self.items.write().map_err(|_| StoreError::Poisoned)?;
        items.remove(key);
        Ok(())
    }
}
