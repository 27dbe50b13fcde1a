//! clickndebrid - Click'n'Load to debrid translation proxy.
//!
//! Accepts CNL submissions on the well-known port, resolves every link with
//! the configured debrid service and forwards the re-encrypted package to the
//! real download manager. Processed packages are cached for the package API.

mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cnd_core::{BatchProcessor, LinkResolver};
use cnd_debrid::{HttpDownstream, RealDebridBackend};
use cnd_server::{AppState, PackageService, Server};
use cnd_storage::Cache;

use crate::config::Args;

const LOG_TARGETS: [&str; 6] = [
    "clickndebrid",
    "cnd_core",
    "cnd_storage",
    "cnd_debrid",
    "cnd_server",
    "tower_http",
];

/// Initialize console logging, plus daily rotated files when a log
/// directory is configured.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let level = args.log_level();
    let directives = LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},warn", directives)));

    if let Some(log_dir) = &args.log_dir {
        if std::fs::create_dir_all(log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(7)
                .filename_prefix("clickndebrid")
                .filename_suffix("log")
                .build(log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stdout))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }

        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        warn!("Log directory {:?} unusable, using console only", log_dir);
        return None;
    }

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    None
}

/// Resolves once Ctrl+C or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting clickndebrid");
    for problem in args.validate() {
        error!("{}", problem);
    }

    // Debrid backend
    let realdebrid = RealDebridBackend::new(args.realdebrid_config())
        .context("failed to build Real-Debrid client")?;
    if !args.realdebrid_api_token.trim().is_empty() {
        match realdebrid.account().await {
            Ok(user) => info!(
                username = %user.username,
                premium = user.is_premium(),
                expiration = ?user.expiration,
                "Real-Debrid account verified"
            ),
            Err(e) => warn!(error = %e, "Could not verify Real-Debrid account"),
        }
    }

    let resolver = LinkResolver::new(Arc::new(realdebrid)).with_timeout(args.resolve_timeout());
    let service_config = args.service_config();
    if !resolver.supports(&service_config.debrid_service) {
        warn!(
            requested = %service_config.debrid_service,
            fallback = resolver.default_name(),
            "Unknown debrid service configured"
        );
    }
    let batch = BatchProcessor::new(resolver).with_policy(args.error_policy());

    // Cache
    let cache_config = args.cache_config();
    if cache_config.redis_enabled {
        info!("Connecting to Redis");
    }
    let cache = Cache::connect(&cache_config).await;
    info!(backend = cache.kind(), ttl = cache_config.default_ttl, "Cache ready");

    // Downstream
    let destination = args.destination_config();
    let downstream =
        HttpDownstream::new(destination).context("failed to build destination client")?;
    info!(endpoint = downstream.endpoint(), "Forwarding packages downstream");

    let service = PackageService::new(batch, cache, Arc::new(downstream), service_config);
    let server = Server::with_state(args.server_config(), AppState::new(service))
        .context("invalid server address")?;

    server
        .run_until(shutdown_signal())
        .await
        .context("server terminated with an error")?;

    Ok(())
}
