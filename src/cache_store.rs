//! Persistence of the last file-list → ID assignment.
//!
//! The cache is keyed by a hash of the sorted file list (plus the module
//! configuration fingerprint). It never changes results: a hit returns exactly
//! what a fresh allocation would have produced for the same inputs.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::warn;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::id_allocator::IdAssignment;

/// Default cache file name, relative to the working directory.
pub const DEFAULT_CACHE_FILE: &str = ".file_id_cache.json";

/// The single record a cache store holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Hash of the sorted, deduplicated file list.
    pub hash: String,
    /// Fingerprint of the module configuration used for the assignment.
    #[serde(default)]
    pub config_hash: String,
    pub file_count: usize,
    pub file_id_map: IdAssignment,
    /// Seconds since the Unix epoch when the record was written.
    pub timestamp: u64,
}

/// Hashes a file list independently of its order and duplicates.
///
/// Only paths contribute; file contents do not.
pub fn file_list_hash(files: &[String]) -> String {
    let mut sorted: Vec<&str> = files.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let joined = sorted.join("\n");
    format!("{:032x}", xxhash_rust::xxh3::xxh3_128(joined.as_bytes()))
}

/// Storage for the cached assignment.
///
/// Implementors provide `load` and `save`; `lookup` and `store` carry the
/// hit/miss policy and are shared by every adapter.
pub trait CacheStore {
    /// Returns the stored record, or `None` if there is none or it is unusable.
    fn load(&self) -> Option<CacheRecord>;

    /// Replaces the stored record.
    fn save(&self, record: &CacheRecord) -> Result<(), CacheError>;

    /// Returns the cached assignment if it was computed for exactly this file
    /// list and configuration. Any difference is a full miss.
    fn lookup(&self, files: &[String], config_hash: &str) -> Option<IdAssignment> {
        let record = self.load()?;
        if record.hash == file_list_hash(files) && record.config_hash == config_hash {
            Some(record.file_id_map)
        } else {
            None
        }
    }

    /// Persists `assignment` for this file list, overwriting any prior record.
    fn store(
        &self,
        files: &[String],
        config_hash: &str,
        assignment: &IdAssignment,
    ) -> Result<(), CacheError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let mut unique: Vec<&String> = files.iter().collect();
        unique.sort();
        unique.dedup();
        self.save(&CacheRecord {
            hash: file_list_hash(files),
            config_hash: config_hash.to_string(),
            file_count: unique.len(),
            file_id_map: assignment.clone(),
            timestamp,
        })
    }
}

/// Cache kept in a JSON file.
pub struct FileCacheStore {
    path: PathBuf,
}

impl FileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<CacheRecord>, CacheError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| CacheError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        let record = serde_json::from_str(&content).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        Ok(Some(record))
    }
}

impl CacheStore for FileCacheStore {
    /// Unreadable or corrupt cache files are reported and treated as empty.
    fn load(&self) -> Option<CacheRecord> {
        match self.read() {
            Ok(record) => record,
            Err(e) => {
                warn!("Cache load failed: {}", e);
                None
            }
        }
    }

    fn save(&self, record: &CacheRecord) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(record).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&self.path, json).map_err(|e| CacheError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// In-process cache, mainly for tests.
#[derive(Default)]
pub struct MemoryCacheStore {
    record: Mutex<Option<CacheRecord>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        *self.record.lock() = None;
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self) -> Option<CacheRecord> {
        self.record.lock().clone()
    }

    fn save(&self, record: &CacheRecord) -> Result<(), CacheError> {
        *self.record.lock() = Some(record.clone());
        Ok(())
    }
}
