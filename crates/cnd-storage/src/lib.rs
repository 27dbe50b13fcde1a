//! Clickndebrid Storage - best-effort package cache.
//!
//! Two interchangeable backends sit behind the [`CacheBackend`] trait:
//!
//! - [`MemoryCache`] - ordered in-process map with lazy TTL eviction
//! - [`RedisCache`] - Redis via a multiplexed connection manager
//!
//! The backend is chosen once at startup by [`Cache::connect`]. Callers only
//! talk to [`Cache`], which serializes values as JSON, bounds every round
//! trip with a timeout and swallows failures.
//!
//! # Example
//!
//! ```no_run
//! use cnd_storage::{Cache, CacheConfig};
//!
//! # async fn demo() {
//! let cache = Cache::connect(&CacheConfig::in_memory()).await;
//! cache.set("package:demo:2024-01-01T00:00:00.000Z", &vec!["http://a/1"], None).await;
//! let page = cache.scan_keys("package:*", 0, 10).await;
//! assert_eq!(page.cursor, 0);
//! # }
//! ```

pub mod backend;
mod cache;
pub mod config;
pub mod error;
pub mod memory;
pub mod pattern;
mod redis_cache;

pub use backend::{CacheBackend, ScanPage};
pub use cache::Cache;
pub use config::{CacheConfig, RedisConfig};
pub use error::{CacheError, Result};
pub use memory::{Clock, ManualClock, MemoryCache, SystemClock};
pub use pattern::KeyPattern;
pub use redis_cache::RedisCache;
