//! TTL cache store persisted to a single JSON file
//!
//! Provides a `CacheStore` that maps string keys (usually coin symbols) to JSON
//! object payloads. Each entry is stamped with its write time and is lazily
//! evicted the first time it is read after its TTL has elapsed.

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};

/// Field holding the write stamp of every entry in the backing file
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Errors that can occur when persisting the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing file or its directory could not be written
    #[error("Failed to write cache file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The store (or a value passed to it) could not be serialized
    #[error("Failed to serialize cache data: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A value to be cached did not serialize to a JSON object
    #[error("Cached value for '{0}' must serialize to a JSON object")]
    NotAnObject(String),
}

/// One cached payload and the time it was written
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The cached payload, without the write stamp
    pub value: Map<String, Value>,
    /// When the entry was written; `None` if the stored stamp was missing or unreadable
    pub written_at: Option<DateTime<Local>>,
}

/// Diagnostic snapshot of a store, taken without evaluating expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    /// Path of the backing file
    pub file: PathBuf,
    /// Configured time-to-live in minutes
    pub ttl_minutes: u32,
    /// Keys currently held, sorted
    pub cached_symbols: Vec<String>,
    /// Number of entries currently held
    pub total_entries: usize,
}

/// Key-value cache with per-entry expiry, persisted to one JSON file
///
/// The whole store is rewritten on every mutation. Expired entries are only
/// dropped when `get`, `evict_expired` or `clear` touches them, so entries
/// that are never read again stay in the file until then.
#[derive(Debug)]
pub struct CacheStore<C: Clock = SystemClock> {
    entries: HashMap<String, CacheEntry>,
    ttl_minutes: u32,
    backing_path: PathBuf,
    clock: C,
}

impl CacheStore<SystemClock> {
    /// Opens a store backed by `backing_path`, using the system clock
    ///
    /// A missing, unreadable or malformed file yields an empty store.
    pub fn open(backing_path: impl Into<PathBuf>, ttl_minutes: u32) -> Self {
        Self::open_with_clock(backing_path, ttl_minutes, SystemClock)
    }
}

impl<C: Clock> CacheStore<C> {
    /// Opens a store backed by `backing_path` with an explicit time source
    pub fn open_with_clock(backing_path: impl Into<PathBuf>, ttl_minutes: u32, clock: C) -> Self {
        let backing_path = backing_path.into();
        let entries = load_entries(&backing_path);
        debug!(
            path = %backing_path.display(),
            entries = entries.len(),
            ttl_minutes,
            "opened cache store"
        );

        Self {
            entries,
            ttl_minutes,
            backing_path,
            clock,
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.backing_path
    }

    /// Configured time-to-live in minutes
    pub fn ttl_minutes(&self) -> u32 {
        self.ttl_minutes
    }

    /// Number of entries held, expired or not
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads an entry, evicting it if it has expired
    ///
    /// # Arguments
    /// * `key` - The cache key to read
    ///
    /// # Returns
    /// * `Ok(Some(entry))` if a fresh entry exists
    /// * `Ok(None)` if the key is absent or its entry expired (the entry is
    ///   then removed and the file rewritten)
    /// * `Err(CacheError)` if rewriting the file after an eviction fails
    pub fn get(&mut self, key: &str) -> Result<Option<&CacheEntry>, CacheError> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) => self.is_expired(entry, now),
        };

        if expired {
            debug!(key, "evicting expired cache entry");
            self.entries.remove(key);
            self.persist()?;
            return Ok(None);
        }

        Ok(self.entries.get(key))
    }

    /// Reads a fresh entry without evicting or writing anything
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        let now = self.clock.now();
        self.entries
            .get(key)
            .filter(|entry| !self.is_expired(entry, now))
    }

    /// Stores `value` under `key`, replacing any previous entry, and rewrites the file
    ///
    /// The `timestamp` field is reserved for the write stamp; a payload field
    /// with that name is dropped.
    pub fn save(&mut self, key: impl Into<String>, mut value: Map<String, Value>) -> Result<(), CacheError> {
        let key = key.into();
        if value.remove(TIMESTAMP_FIELD).is_some() {
            debug!(key = %key, "dropping reserved timestamp field from cached value");
        }

        let entry = CacheEntry {
            value,
            written_at: Some(self.clock.now()),
        };
        self.entries.insert(key, entry);
        self.persist()
    }

    /// Serializes `data` and stores it under `key`
    ///
    /// `data` must serialize to a JSON object.
    pub fn save_serialized<T: Serialize>(&mut self, key: &str, data: &T) -> Result<(), CacheError> {
        match serde_json::to_value(data)? {
            Value::Object(map) => self.save(key, map),
            _ => Err(CacheError::NotAnObject(key.to_string())),
        }
    }

    /// Removes one entry (`Some(key)`) or every entry (`None`), then rewrites the file
    ///
    /// The file is rewritten even when nothing was removed.
    pub fn clear(&mut self, key: Option<&str>) -> Result<(), CacheError> {
        match key {
            Some(key) => {
                self.entries.remove(key);
            }
            None => self.entries.clear(),
        }
        self.persist()
    }

    /// Removes every expired entry and returns how many were removed
    ///
    /// The file is only rewritten when at least one entry was removed.
    pub fn evict_expired(&mut self) -> Result<usize, CacheError> {
        let now = self.clock.now();
        let before = self.entries.len();
        let ttl_minutes = self.ttl_minutes;
        self.entries
            .retain(|_, entry| !entry_expired(entry, ttl_minutes, now));

        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
            self.persist()?;
        }
        Ok(removed)
    }

    /// Describes the store without evaluating expiry
    pub fn describe(&self) -> CacheInfo {
        let mut cached_symbols: Vec<String> = self.entries.keys().cloned().collect();
        cached_symbols.sort();

        CacheInfo {
            file: self.backing_path.clone(),
            ttl_minutes: self.ttl_minutes,
            total_entries: cached_symbols.len(),
            cached_symbols,
        }
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Local>) -> bool {
        entry_expired(entry, self.ttl_minutes, now)
    }

    /// Ensures the directory holding the backing file exists
    fn ensure_dir(&self) -> io::Result<()> {
        match self.backing_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
            _ => Ok(()),
        }
    }

    /// Rewrites the whole backing file from the in-memory entries
    fn persist(&self) -> Result<(), CacheError> {
        let write_error = |source| CacheError::Write {
            path: self.backing_path.clone(),
            source,
        };

        self.ensure_dir().map_err(write_error)?;

        let document: Map<String, Value> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), Value::Object(to_stored(entry))))
            .collect();
        let json = serde_json::to_string_pretty(&document)?;

        fs::write(&self.backing_path, json).map_err(write_error)
    }
}

/// An entry is fresh strictly before `written_at + ttl`, so a zero TTL expires at once
fn entry_expired(entry: &CacheEntry, ttl_minutes: u32, now: DateTime<Local>) -> bool {
    let Some(written_at) = entry.written_at else {
        return true;
    };

    match written_at.checked_add_signed(Duration::minutes(i64::from(ttl_minutes))) {
        Some(expiry) => now >= expiry,
        None => false,
    }
}

/// Flattens an entry back into its on-disk object form
fn to_stored(entry: &CacheEntry) -> Map<String, Value> {
    let mut stored = entry.value.clone();
    if let Some(written_at) = entry.written_at {
        stored.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::String(written_at.to_rfc3339()),
        );
    }
    stored
}

/// Loads entries from disk, treating any failure as an empty store
fn load_entries(path: &Path) -> HashMap<String, CacheEntry> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no cache file yet");
            return HashMap::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read cache file, starting empty");
            return HashMap::new();
        }
    };

    let document: Map<String, Value> = match serde_json::from_str(&content) {
        Ok(document) => document,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed cache file, starting empty");
            return HashMap::new();
        }
    };

    document
        .into_iter()
        .map(|(key, stored)| {
            let entry = match stored {
                Value::Object(mut value) => {
                    let written_at = value
                        .remove(TIMESTAMP_FIELD)
                        .as_ref()
                        .and_then(Value::as_str)
                        .and_then(parse_timestamp);
                    CacheEntry { value, written_at }
                }
                _ => CacheEntry {
                    value: Map::new(),
                    written_at: None,
                },
            };
            (key, entry)
        })
        .collect()
}

/// Parses an ISO 8601 stamp, with or without offset
///
/// Stamps without an offset (e.g. "2024-07-15T14:00:00.123456") are read as local time.
fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Local));
    }

    let naive: NaiveDateTime = raw.parse().ok()?;
    Local.from_local_datetime(&naive).earliest()
}
