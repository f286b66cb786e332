//! Lookup result cache with wall-clock expiry.
//!
//! Results are keyed by advertiser handle, country and date window, stored
//! as JSON strings in a key-value [`CacheStore`], and treated as absent once
//! older than the configured lifetime. Nothing is deleted explicitly;
//! stale entries are overwritten by the next successful lookup.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::protocol::LookupResult;
use crate::scope::LookupScope;
use crate::{Error, Result};

/// Composite cache key of one lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn new(handle: &str, scope: &LookupScope) -> Self {
        Self(format!(
            "adv_{}_{}_{}_{}",
            handle,
            scope.country,
            scope.date_range.start.as_deref().unwrap_or_default(),
            scope.date_range.end.as_deref().unwrap_or_default(),
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stored value: the result plus its write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    result: LookupResult,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
}

/// String key-value storage behind the cache.
pub trait CacheStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
}

/// In-memory store, lost with the page.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Durable store: a JSON object file, rewritten on every write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl FileStore {
    /// Open a store file, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| {
                    Error::CacheError(format!("{} is not a cache file: {e}", path.display()))
                })?
            }
        } else {
            HashMap::new()
        };
        debug!("opened cache file {} ({} entries)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        let mut next = self.entries.clone();
        next.insert(key.to_string(), value);
        let json = serde_json::to_string_pretty(&next)?;
        fs::write(&self.path, json).map_err(|e| {
            Error::CacheError(format!("writing {} failed: {e}", self.path.display()))
        })?;
        self.entries = next;
        Ok(())
    }
}

/// Lookup cache over a [`CacheStore`].
pub struct LookupCache {
    store: Box<dyn CacheStore>,
    ttl: Duration,
}

impl LookupCache {
    pub fn new(store: Box<dyn CacheStore>, ttl: std::time::Duration) -> Self {
        Self {
            store,
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
        }
    }

    /// In-memory cache with the given lifetime.
    #[must_use]
    pub fn in_memory(ttl: std::time::Duration) -> Self {
        Self::new(Box::new(MemoryStore::new()), ttl)
    }

    /// Fresh result for `key` as of `now`. Stale, future-stamped or unreadable
    /// entries are misses.
    #[must_use]
    pub fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<LookupResult> {
        let raw = self.store.get(key.as_str())?;
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("ignoring unreadable cache entry {}: {e}", key.as_str());
                return None;
            }
        };
        let age = now.signed_duration_since(entry.timestamp);
        if age < Duration::zero() || age >= self.ttl {
            return None;
        }
        Some(entry.result)
    }

    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<LookupResult> {
        self.get_at(key, Utc::now())
    }

    /// Store a result stamped with `now`.
    pub fn put_at(&mut self, key: &CacheKey, result: &LookupResult, now: DateTime<Utc>) -> Result<()> {
        let entry = CacheEntry {
            result: result.clone(),
            timestamp: now,
        };
        self.store.set(key.as_str(), serde_json::to_string(&entry)?)
    }

    pub fn put(&mut self, key: &CacheKey, result: &LookupResult) -> Result<()> {
        self.put_at(key, result, Utc::now())
    }
}

impl std::fmt::Debug for LookupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupCache").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}
