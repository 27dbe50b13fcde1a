//! Redis cache backend.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{ConnectionInfo, IntoConnectionInfo};
use tracing::{info, warn};

use crate::backend::{CacheBackend, ScanPage, DEFAULT_SCAN_COUNT};
use crate::config::RedisConfig;
use crate::error::{CacheError, Result};

/// First reconnect delay; doubles per attempt.
const BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Upper bound for a single reconnect delay.
const BACKOFF_MAX: Duration = Duration::from_secs(3);

/// Cache backend talking to a Redis server.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connects with retries and a bounded overall budget.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let info = connection_info(config)?;
        let client = redis::Client::open(info)?;

        tokio::time::timeout(config.connect_timeout, Self::connect_with_retry(client, config))
            .await
            .map_err(|_| CacheError::Timeout(config.connect_timeout))?
    }

    async fn connect_with_retry(client: redis::Client, config: &RedisConfig) -> Result<Self> {
        let attempts = config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match Self::try_connect(&client).await {
                Ok(cache) => {
                    info!(attempt = attempt + 1, "Connected to Redis");
                    return Ok(cache);
                }
                Err(e) if attempt + 1 < attempts => {
                    let delay = backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Redis connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_connect(client: &redis::Client) -> Result<Self> {
        let mut manager = ConnectionManager::new(client.clone()).await?;
        let _: String = redis::cmd("PING").query_async(&mut manager).await?;
        Ok(Self { manager })
    }
}

/// Builds connection info from the URL, with explicit credentials taking
/// precedence over any embedded in it.
pub(crate) fn connection_info(config: &RedisConfig) -> Result<ConnectionInfo> {
    let mut info = config
        .url
        .as_str()
        .into_connection_info()
        .map_err(|e| CacheError::Config(format!("invalid Redis URL: {}", e)))?;

    if let Some(username) = config.username.as_ref().filter(|u| !u.is_empty()) {
        info.redis.username = Some(username.clone());
    }
    if let Some(password) = config.password.as_ref().filter(|p| !p.is_empty()) {
        info.redis.password = Some(password.clone());
    }

    Ok(info)
}

/// Delay before reconnect attempt `attempt + 1`.
pub(crate) fn backoff(attempt: u32) -> Duration {
    BACKOFF_BASE
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(BACKOFF_MAX)
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = set_command(key, &value, ttl).query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let count: i64 = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(count > 0)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        let keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?;
        Ok(keys)
    }

    async fn scan(&self, pattern: &str, cursor: u64, count: usize) -> Result<ScanPage> {
        let mut conn = self.manager.clone();
        let reply: redis::Value = scan_command(pattern, cursor, count)
            .query_async(&mut conn)
            .await?;
        parse_scan_reply(&reply)
    }
}

/// `SET key value [EX secs]`. Zero TTLs store without expiry; sub-second
/// TTLs round up to one second.
pub(crate) fn set_command(key: &str, value: &str, ttl: Option<Duration>) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if let Some(ttl) = ttl.filter(|ttl| !ttl.is_zero()) {
        cmd.arg("EX").arg(ttl.as_secs().max(1));
    }
    cmd
}

/// `SCAN cursor MATCH pattern COUNT count`.
pub(crate) fn scan_command(pattern: &str, cursor: u64, count: usize) -> redis::Cmd {
    let count = if count == 0 { DEFAULT_SCAN_COUNT } else { count };
    let mut cmd = redis::cmd("SCAN");
    cmd.arg(cursor)
        .arg("MATCH")
        .arg(pattern)
        .arg("COUNT")
        .arg(count);
    cmd
}

/// Decodes the `[cursor, [key, ...]]` reply of `SCAN`.
pub(crate) fn parse_scan_reply(reply: &redis::Value) -> Result<ScanPage> {
    let (cursor, keys): (u64, Vec<String>) = redis::from_redis_value(reply)?;
    Ok(ScanPage { cursor, keys })
}
