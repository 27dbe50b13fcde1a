//! Cache configuration.

use std::time::Duration;

/// Default Redis URL.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Default entry lifetime in seconds (one day).
pub const DEFAULT_TTL_SECS: u64 = 86_400;

/// Default bound for a single cache round trip.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(3);

/// Redis connection settings.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Connection attempts before giving up.
    pub max_attempts: u32,
    /// Overall budget for establishing the connection.
    pub connect_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            username: None,
            password: None,
            max_attempts: 3,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Creates a config for the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets ACL credentials.
    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    /// Sets the overall connect budget.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Cache selection and behaviour.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Use Redis when true, the in-memory map otherwise.
    pub redis_enabled: bool,
    pub redis: RedisConfig,
    /// Store-wide TTL in seconds applied when a write gives none; `0`
    /// disables expiry.
    pub default_ttl: u64,
    /// Bound for each backend round trip.
    pub op_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_enabled: true,
            redis: RedisConfig::default(),
            default_ttl: DEFAULT_TTL_SECS,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }
}

impl CacheConfig {
    /// Creates a config for the in-memory backend.
    pub fn in_memory() -> Self {
        Self {
            redis_enabled: false,
            ..Default::default()
        }
    }

    /// Creates a config for a Redis backend.
    pub fn with_redis(redis: RedisConfig) -> Self {
        Self {
            redis_enabled: true,
            redis,
            ..Default::default()
        }
    }

    /// Sets the default TTL in seconds.
    pub fn with_default_ttl(mut self, secs: u64) -> Self {
        self.default_ttl = secs;
        self
    }
}
