//! In-process cache backend.
//!
//! Entries live in an ordered map behind a lock, so key listings come back
//! sorted and scan cursors are stable offsets into that order. Expired
//! entries are evicted lazily, whenever a read touches them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::backend::{CacheBackend, ScanPage, DEFAULT_SCAN_COUNT};
use crate::error::Result;
use crate::pattern::KeyPattern;

/// Time source for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Cache backend backed by a process-local map.
pub struct MemoryCache {
    entries: RwLock<BTreeMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Creates an empty cache on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty cache with a custom time source.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            debug!(key, "Evicted expired cache entry");
        }
        None
    }

    /// Evicts expired entries and returns the live keys matching `pattern`,
    /// in key order.
    fn matching_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = KeyPattern::new(pattern)?;
        let now = self.clock.now();

        let mut entries = self.entries.write();
        entries.retain(|_, entry| !entry.is_expired(now));

        Ok(entries
            .keys()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|ttl| self.clock.now() + ttl);
        self.entries
            .write()
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live_value(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live_value(key).is_some())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.matching_keys(pattern)
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage> {
        let keys = self.matching_keys(pattern)?;
        let count = if count == 0 { DEFAULT_SCAN_COUNT } else { count };

        let start = (cursor as usize).min(keys.len());
        let end = (start + count).min(keys.len());
        let next = if end >= keys.len() { 0 } else { end as u64 };

        Ok(ScanPage {
            cursor: next,
            keys: keys[start..end].to_vec(),
        })
    }
}
