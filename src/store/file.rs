//! File-backed credential store with atomic writes.
//!
//! The whole key/value map is kept as a single JSON document. Writes go to a
//! temporary file in the same directory which is then renamed over the
//! target, so an interrupted write never leaves a half-written document.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{CredentialStore, StoreError, StoreResult};

/// Default name for the linkboard state directory.
const STATE_DIR_NAME: &str = "linkboard";

/// Default name for the store document.
const STORE_FILE_NAME: &str = "storage.json";

/// Durable store persisted as a JSON document on disk.
#[derive(Debug)]
pub struct FileStore {
    /// Path to the store document.
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store at `path`, creating its parent directory if needed.
    ///
    /// The document itself is created lazily on the first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Open the store at the platform default location.
    ///
    /// Falls back to the current directory when no data directory exists.
    pub fn open_default() -> StoreResult<Self> {
        Self::open(Self::default_path())
    }

    /// Platform default location of the store document.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(STATE_DIR_NAME)
            .join(STORE_FILE_NAME)
    }

    /// Path to the store document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> StoreResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn write_document(&self, items: &BTreeMap<String, String>) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(items)?;

        let temp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    fn modify<F>(&self, apply: F) -> StoreResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;

        let mut items = match self.read_document() {
            Ok(items) => items,
            Err(StoreError::Json(e)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Store document is corrupt, starting from an empty store"
                );
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };

        apply(&mut items);
        self.write_document(&items)
    }
}

impl CredentialStore for FileStore {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        let mut items = self.read_document()?;
        Ok(items.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        self.modify(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.modify(|items| {
            items.remove(key);
        })
    }
}
