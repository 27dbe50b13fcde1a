//! Cache backend capability.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Page size used when a scan asks for zero keys.
pub const DEFAULT_SCAN_COUNT: usize = 10;

/// One page of a cursor-based key scan.
///
/// A returned `cursor` of `0` means the scan is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPage {
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// Raw string key/value store with TTL and glob pattern listing.
///
/// Backends report failures; the [`Cache`](crate::Cache) front decides what
/// to do with them.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short backend name for logs.
    fn kind(&self) -> &'static str;

    /// Stores `value`, expiring after `ttl` when given.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    /// Returns the value, `None` when missing or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Removes the key. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Returns whether a live value exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Returns every live key matching `pattern`.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Returns one page of keys matching `pattern`, starting at `cursor`.
    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage>;
}
