//! Durable key -> JSON string storage for learned preferences.
//!
//! The debounce never depends on the store succeeding: load and save
//! failures are logged and the learned state stays in memory.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use crate::error::{Result, StoreError};

/// Key under which the debounce persists learned per-pattern delays.
pub const PREFERENCES_KEY: &str = "adaptive_debounce_preferences";

/// Simple string key-value store.
pub trait PreferenceStore: Send + Sync + fmt::Debug {
    /// Read the value for `key`, `None` if it was never written.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value for `key`.
    fn store(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the value for `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Store keeping one `<key>.json` file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in the platform data directory for the notebook app.
    pub fn open_default() -> Self {
        Self::new(default_store_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl PreferenceStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io {
                operation: "read",
                path,
                source: e,
            }),
        }
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        write_atomic(&path, value.as_bytes())?;
        tracing::debug!("Stored {} at {}", key, path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io {
                operation: "remove",
                path,
                source: e,
            }),
        }
    }
}

/// Write via a uniquely named temp file + rename so a crash never leaves a
/// torn file and concurrent writers never share a temp file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    fs::create_dir_all(dir).map_err(|e| StoreError::Io {
        operation: "create directory",
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| StoreError::Io {
        operation: "create",
        path: dir.to_path_buf(),
        source: e,
    })?;

    temp.write_all(bytes).map_err(|e| StoreError::Io {
        operation: "write",
        path: temp.path().to_path_buf(),
        source: e,
    })?;

    temp.as_file().sync_all().map_err(|e| StoreError::Io {
        operation: "sync",
        path: temp.path().to_path_buf(),
        source: e,
    })?;

    temp.persist(path).map_err(|e| StoreError::AtomicWriteFailed {
        temp_path: e.file.path().to_path_buf(),
        target_path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Platform data directory for the notebook app, or the working directory.
pub fn default_store_dir() -> PathBuf {
    directories::ProjectDirs::from("app", "Notebook", "Notebook")
        .map(|dirs| dirs.data_dir().join("autosave"))
        .unwrap_or_else(|| PathBuf::from(".notebook-autosave"))
}
