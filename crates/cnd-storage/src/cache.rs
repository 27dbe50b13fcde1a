//! Best-effort cache front.
//!
//! [`Cache`] owns JSON (de)serialization, the store-wide TTL and the per-call
//! timeout. Every failure is logged here and turned into a miss, `false` or
//! an empty listing, so callers never see a cache error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::backend::{CacheBackend, ScanPage};
use crate::config::{CacheConfig, DEFAULT_OP_TIMEOUT};
use crate::error::{CacheError, Result};
use crate::memory::MemoryCache;
use crate::redis_cache::RedisCache;

/// Shared handle to the selected cache backend.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Option<Duration>,
    op_timeout: Duration,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("backend", &self.backend.kind())
            .field("default_ttl", &self.default_ttl)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

impl Cache {
    /// Wraps a backend with no default TTL.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            default_ttl: None,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    /// Creates an in-memory cache with no default TTL.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    /// Selects and connects the backend described by `config`.
    ///
    /// When Redis is enabled but cannot be reached the in-memory backend is
    /// used for the rest of the process.
    pub async fn connect(config: &CacheConfig) -> Self {
        let backend: Arc<dyn CacheBackend> = if config.redis_enabled {
            match RedisCache::connect(&config.redis).await {
                Ok(redis) => Arc::new(redis),
                Err(e) => {
                    error!(error = %e, "Redis unavailable, falling back to in-memory cache");
                    Arc::new(MemoryCache::new())
                }
            }
        } else {
            Arc::new(MemoryCache::new())
        };

        debug!(backend = backend.kind(), "Cache backend selected");
        Self::new(backend)
            .with_default_ttl(config.default_ttl)
            .with_op_timeout(config.op_timeout)
    }

    /// Sets the store-wide TTL in seconds; `0` disables it.
    pub fn with_default_ttl(mut self, secs: u64) -> Self {
        self.default_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    /// Sets the bound for each backend round trip.
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Returns the backend name.
    pub fn kind(&self) -> &'static str {
        self.backend.kind()
    }

    /// Stores `value` as JSON. `ttl` in seconds overrides the default.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<u64>,
    ) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                error!(key, error = %e, "Failed to serialize cache value");
                return false;
            }
        };
        let ttl = ttl.map(Duration::from_secs).or(self.default_ttl);

        self.guarded("set", key, self.backend.set(key, raw, ttl))
            .await
            .is_some()
    }

    /// Loads and decodes a value. Misses, expired entries, backend failures
    /// and undecodable values all yield `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.guarded("get", key, self.backend.get(key)).await??;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(key, error = %CacheError::from(e), "Failed to decode cache value");
                None
            }
        }
    }

    /// Removes a key; returns `false` only when the backend failed.
    pub async fn delete(&self, key: &str) -> bool {
        self.guarded("delete", key, self.backend.delete(key))
            .await
            .is_some()
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.guarded("exists", key, self.backend.exists(key))
            .await
            .unwrap_or(false)
    }

    /// Returns every key matching the glob `pattern`.
    pub async fn keys(&self, pattern: &str) -> Vec<String> {
        self.guarded("keys", pattern, self.backend.keys(pattern))
            .await
            .unwrap_or_default()
    }

    /// Returns one page of a key scan. On failure the scan ends: an empty
    /// page with cursor `0`.
    pub async fn scan_keys(&self, pattern: &str, cursor: u64, count: usize) -> ScanPage {
        self.guarded("scan", pattern, self.backend.scan(pattern, cursor, count))
            .await
            .unwrap_or_default()
    }

    /// Walks a scan to completion and returns every matching key once.
    pub async fn scan_all(&self, pattern: &str, count: usize) -> Vec<String> {
        let mut keys = Vec::new();
        let mut cursor = 0;
        loop {
            let page = self.scan_keys(pattern, cursor, count).await;
            keys.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        keys.sort();
        keys.dedup();
        keys
    }

    /// Loads several keys; each failed key yields `None` in its slot.
    pub async fn get_multiple<T: DeserializeOwned>(&self, keys: &[String]) -> Vec<Option<T>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await);
        }
        values
    }

    /// Stores several entries; failed keys are logged and skipped. Returns
    /// how many were stored.
    pub async fn set_multiple<T: Serialize>(
        &self,
        entries: &[(String, T)],
        ttl: Option<u64>,
    ) -> usize {
        let mut stored = 0;
        for (key, value) in entries {
            if self.set(key, value, ttl).await {
                stored += 1;
            } else {
                warn!(key = %key, "Skipped cache entry in batch write");
            }
        }
        stored
    }

    /// Runs one backend round trip under the operation timeout, logging and
    /// discarding any failure.
    async fn guarded<T>(
        &self,
        op: &'static str,
        key: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Option<T> {
        let result = match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        };

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                error!(
                    op,
                    key,
                    backend = self.backend.kind(),
                    error = %e,
                    "Cache operation failed"
                );
                None
            }
        }
    }
}
