//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

use cnd_core::ErrorPolicy;
use cnd_debrid::{DestinationConfig, RealDebridConfig};
use cnd_server::{ServerConfig, ServiceConfig};
use cnd_storage::{CacheConfig, RedisConfig};

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// clickndebrid - Click'n'Load to debrid translation proxy
#[derive(Parser, Debug, Clone)]
#[command(name = "clickndebrid", version, about)]
pub struct Args {
    /// Address to bind
    #[arg(long, env = "CND_HOST", default_value = cnd_server::DEFAULT_HOST)]
    pub host: String,

    /// Port to bind
    #[arg(long, env = "CND_PORT", default_value_t = cnd_server::DEFAULT_PORT)]
    pub port: u16,

    /// Base URL of the download manager receiving resolved packages
    #[arg(
        long,
        env = "CND_DESTINATION_URL",
        default_value = cnd_debrid::destination::DEFAULT_DESTINATION_URL
    )]
    pub destination_url: String,

    /// Debrid backend used to resolve links
    #[arg(long, env = "CND_DEBRIDSERVICE", default_value = "realdebrid")]
    pub debrid_service: String,

    /// Real-Debrid API token
    #[arg(long, env = "CND_REALDEBRID_APITOKEN", default_value = "", hide_env_values = true)]
    pub realdebrid_api_token: String,

    /// Abort a package on the first link that fails to resolve
    #[arg(
        long,
        env = "CND_ERROR_ON_API_ERROR",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub error_on_api_error: bool,

    /// Use Redis for the package cache
    #[arg(
        long,
        env = "CND_REDIS_ENABLED",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub redis_enabled: bool,

    /// Redis connection URL
    #[arg(long, env = "CND_REDIS_URL", default_value = cnd_storage::config::DEFAULT_REDIS_URL)]
    pub redis_url: String,

    /// Redis ACL user
    #[arg(long, env = "CND_REDIS_USERNAME")]
    pub redis_username: Option<String>,

    /// Redis password
    #[arg(long, env = "CND_REDIS_PASSWORD", hide_env_values = true)]
    pub redis_password: Option<String>,

    /// Default cache TTL in seconds (0 disables expiry)
    #[arg(long, env = "CND_REDIS_TTL", default_value_t = cnd_storage::config::DEFAULT_TTL_SECS)]
    pub redis_ttl: u64,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, env = "CND_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Directory for daily rotated log files
    #[arg(long, env = "CND_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Upper bound for resolving a single link, in seconds
    #[arg(long, env = "CND_RESOLVE_TIMEOUT", default_value_t = 30)]
    pub resolve_timeout_secs: u64,
}

impl Args {
    /// Normalized log level; unknown values read as `info`.
    pub fn log_level(&self) -> &str {
        let level = self.log_level.trim();
        LOG_LEVELS
            .iter()
            .find(|known| known.eq_ignore_ascii_case(level))
            .copied()
            .unwrap_or("info")
    }

    /// Lists configuration problems. None of them prevent startup.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.realdebrid_api_token.trim().is_empty() {
            problems.push(
                "CND_REALDEBRID_APITOKEN is not set, link resolution will fail".to_string(),
            );
        }
        if !LOG_LEVELS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(self.log_level.trim()))
        {
            problems.push(format!(
                "Unknown log level '{}', using info",
                self.log_level
            ));
        }
        if self.resolve_timeout_secs == 0 {
            problems.push("Resolve timeout of 0s rejects every link".to_string());
        }

        problems
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::from_flag(self.error_on_api_error)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::default()
            .with_host(self.host.clone())
            .with_port(self.port)
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            debrid_service: self.debrid_service.trim().to_lowercase(),
            ..Default::default()
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        let redis = RedisConfig::new(self.redis_url.clone())
            .with_credentials(self.redis_username.clone(), self.redis_password.clone());

        let config = if self.redis_enabled {
            CacheConfig::with_redis(redis)
        } else {
            CacheConfig {
                redis,
                ..CacheConfig::in_memory()
            }
        };
        config.with_default_ttl(self.redis_ttl)
    }

    pub fn realdebrid_config(&self) -> RealDebridConfig {
        RealDebridConfig::new(self.realdebrid_api_token.trim())
    }

    pub fn destination_config(&self) -> DestinationConfig {
        DestinationConfig::new(self.destination_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["clickndebrid"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_override_defaults() {
        let args = parse(&[
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--redis-enabled",
            "false",
            "--error-on-api-error",
            "yes",
            "--redis-ttl",
            "0",
            "--realdebrid-api-token",
            "tok",
        ]);

        assert_eq!(args.server_config().host, "127.0.0.1");
        assert_eq!(args.server_config().port, 9000);
        assert!(!args.cache_config().redis_enabled);
        assert_eq!(args.cache_config().default_ttl, 0);
        assert_eq!(args.error_policy(), ErrorPolicy::StopOnError);
        assert_eq!(args.realdebrid_config().api_token, "tok");
    }

    #[test]
    fn redis_credentials_are_forwarded() {
        let args = parse(&[
            "--redis-url",
            "redis://cache:6380",
            "--redis-username",
            "app",
            "--redis-password",
            "pw",
        ]);
        let cache = args.cache_config();

        assert_eq!(cache.redis.url, "redis://cache:6380");
        assert_eq!(cache.redis.username.as_deref(), Some("app"));
        assert_eq!(cache.redis.password.as_deref(), Some("pw"));
    }

    #[test]
    fn service_name_is_normalized() {
        let args = parse(&["--debrid-service", " RealDebrid "]);
        assert_eq!(args.service_config().debrid_service, "realdebrid");
    }

    #[test]
    fn log_level_falls_back_to_info() {
        assert_eq!(parse(&["--log-level", "DEBUG"]).log_level(), "debug");
        assert_eq!(parse(&["--log-level", "loud"]).log_level(), "info");
    }

    #[test]
    fn validate_reports_missing_token() {
        let args = parse(&["--realdebrid-api-token", "", "--log-level", "loud"]);
        let problems = args.validate();

        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("CND_REALDEBRID_APITOKEN"));

        let args = parse(&["--realdebrid-api-token", "tok"]);
        assert!(args.validate().is_empty());
    }

    #[test]
    fn destination_endpoint_is_derived() {
        let args = parse(&["--destination-url", "http://jd:9666/"]);
        assert_eq!(
            args.destination_config().endpoint(),
            "http://jd:9666/flash/addcrypted2"
        );
    }
}
