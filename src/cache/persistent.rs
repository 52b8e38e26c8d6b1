//! Persistent Store Module
//!
//! Durable fallback tier: one JSON file per key under a data directory.

use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;
use tracing::debug;

use crate::error::{CacheError, Result};

// == Persistent Store ==
/// File-backed storage for values demoted out of memory.
///
/// Files hold the bare JSON value with no timestamp or wrapper. The data
/// directory is created on the first write.
#[derive(Debug, Clone)]
pub struct PersistentStore {
    data_dir: PathBuf,
    log_enabled: bool,
}

impl PersistentStore {
    // == Constructor ==
    /// Creates a store rooted at `data_dir`. Nothing touches the filesystem yet.
    pub fn new(data_dir: impl Into<PathBuf>, log_enabled: bool) -> Self {
        Self {
            data_dir: data_dir.into(),
            log_enabled,
        }
    }

    /// Directory holding the persisted values.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // == Path For ==
    /// Returns the file path for `key`.
    ///
    /// Keys must be a single plain path component so they cannot escape the
    /// data directory.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let invalid = key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(|c| matches!(c, '/' | '\\' | '\0'));
        if invalid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.data_dir.join(key))
    }

    // == Write ==
    /// Serializes `value` and stores it, replacing any previous file for `key`.
    ///
    /// The bytes are staged in a temporary file and renamed over the target,
    /// so a concurrent read sees either the old value or the new one.
    pub async fn write(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.path_for(key)?;
        let raw = serde_json::to_vec(value)?;

        fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| CacheError::persistence(key, e))?;

        let data_dir = self.data_dir.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            // same directory as the target, so the rename stays on one filesystem
            let mut staged = tempfile::Builder::new()
                .prefix(".staged-")
                .tempfile_in(&data_dir)?;
            staged.write_all(&raw)?;
            staged.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::persistence(key, io::Error::new(ErrorKind::Other, e)))?
        .map_err(|e| CacheError::persistence(key, e))?;

        if self.log_enabled {
            debug!(key = %key, path = ?path, "Wrote value to disk");
        }
        Ok(())
    }

    // == Read ==
    /// Loads the value for `key`.
    ///
    /// Returns `None` when there is no file or when its contents do not
    /// decode; both are reported to callers as absence.
    pub async fn read(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key).ok()?;

        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                if self.log_enabled && e.kind() != ErrorKind::NotFound {
                    debug!(key = %key, error = %e, "Failed to read persisted value");
                }
                return None;
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(value) => {
                if self.log_enabled {
                    debug!(key = %key, "Read value from disk");
                }
                Some(value)
            }
            Err(e) => {
                if self.log_enabled {
                    debug!(key = %key, error = %e, "Persisted value does not decode");
                }
                None
            }
        }
    }

    // == Remove ==
    /// Deletes the file for `key`. Missing files are not an error.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let Ok(path) = self.path_for(key) else {
            // nothing can have been written under an invalid key
            return Ok(());
        };

        match fs::remove_file(&path).await {
            Ok(()) => {
                if self.log_enabled {
                    debug!(key = %key, "Removed persisted value");
                }
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::persistence(key, e)),
        }
    }
}
