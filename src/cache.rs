//! Time-boxed dataset cache.
//!
//! Parsed record lists are stored as one JSON file per dataset key under the
//! cache directory. An entry is served only while its age is below the
//! configured duration; there is no size bound and no LRU, only expiry and
//! explicit clearing.

use crate::error::CacheError;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const EXTENSION: &str = "cache.json";

/// What is written to disk for one key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>, duration: Duration) -> bool {
        now.signed_duration_since(self.created_at) < duration
    }
}

#[derive(Debug, Clone)]
pub struct DatasetCache {
    dir: PathBuf,
    duration: Duration,
}

impl DatasetCache {
    /// Open a cache rooted at `dir`, creating the directory if needed.
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory holding one `{key}.cache.json` file per dataset
    /// * `duration` - Age below which an entry is served
    ///
    /// # Example
    ///
    /// ```ignore
    /// let cache = DatasetCache::new(".cache/market_newsletter", Duration::minutes(30))?;
    /// cache.put("market_news", &news)?;
    /// let again: Option<Vec<NewsRecord>> = cache.get("market_news");
    /// ```
    pub fn new(dir: impl AsRef<Path>, duration: Duration) -> Result<Self, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, duration })
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Cached payload for `key` if it is still fresh.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now())
    }

    /// [`get`](Self::get) evaluated at an explicit instant.
    ///
    /// Unreadable or undecodable entries are logged and reported as misses.
    pub fn get_at<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let path = self.entry_path(key);
        if !path.exists() {
            debug!(key, "Cache miss");
            return None;
        }

        let entry = match self.read_entry(&path) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Failed to read cache entry; treating as miss");
                return None;
            }
        };

        if !entry.is_fresh(now, self.duration) {
            debug!(key, created_at = %entry.created_at, "Cache entry expired");
            return None;
        }

        match serde_json::from_value(entry.payload) {
            Ok(value) => {
                info!(key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Cached payload has an unexpected shape; treating as miss");
                None
            }
        }
    }

    /// Store `payload` under `key`, replacing any previous entry.
    pub fn put<T: Serialize>(&self, key: &str, payload: &T) -> Result<(), CacheError> {
        self.put_at(key, payload, Utc::now())
    }

    pub fn put_at<T: Serialize>(
        &self,
        key: &str,
        payload: &T,
        created_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry {
            key: key.to_string(),
            created_at,
            payload: serde_json::to_value(payload)?,
        };
        let json = serde_json::to_string(&entry)?;
        std::fs::write(self.entry_path(key), json)?;
        info!(key, "Cached dataset");
        Ok(())
    }

    /// Whether `key` currently has a fresh entry.
    pub fn is_valid(&self, key: &str) -> bool {
        let path = self.entry_path(key);
        path.exists()
            && self
                .read_entry(&path)
                .map(|entry| entry.is_fresh(Utc::now(), self.duration))
                .unwrap_or(false)
    }

    /// Delete the entry for `key`. Returns whether a file was removed.
    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        info!(key, "Removed cache entry");
        Ok(true)
    }

    /// Delete every entry. Returns how many files were removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_entry = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(EXTENSION));
            if path.is_file() && is_entry {
                std::fs::remove_file(path)?;
                removed += 1;
            }
        }
        info!(removed, "Cleared cache");
        Ok(removed)
    }

    fn read_entry(&self, path: &Path) -> Result<CacheEntry, CacheError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{EXTENSION}"))
    }
}
