//! Clickndebrid Server - CNL endpoint and package API.
//!
//! ## Endpoints
//!
//! - `POST /flash/addcrypted2` - Resolve an encrypted link list and forward it
//! - `GET /flash` - CNL liveness check
//! - `GET /jdcheck.js` - Browser extension capability check
//! - `GET /health` - Service status
//! - `GET /api/v1/packages` - Paginated package listing
//! - `GET /api/v1/packages/{name}` - One cached package
//! - `DELETE /api/v1/packages/{name}` - Remove a cached package
//! - `GET /api/v1/packages/{name}/filelist` - Resolved links as a text file
//! - `POST /api/v1/packages/{name}/resubmit` - Replay a package downstream
//! - `POST /api/v1/packages/{name}/redebrid` - Resolve a package again
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cnd_server::{AppState, PackageService, Server, ServerConfig, ServiceConfig};
//! # async fn example(
//! #     batch: cnd_core::BatchProcessor,
//! #     downstream: Arc<dyn cnd_core::Downstream>,
//! # ) -> Result<(), cnd_server::ServerError> {
//! let service = PackageService::new(
//!     batch,
//!     cnd_storage::Cache::in_memory(),
//!     downstream,
//!     ServiceConfig::default(),
//! );
//! let server = Server::with_state(ServerConfig::default(), AppState::new(service))?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
mod handlers;
pub mod models;
pub mod service;
pub mod state;

#[cfg(test)]
mod test_support;

use std::future::Future;
use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{ApiError, Result};
pub use handlers::CNL_FAILURE_MESSAGE;
pub use service::{PackageService, PageRequest, ServiceConfig, ServiceError};
pub use state::AppState;

/// Default server port, the one CNL clients connect to.
pub const DEFAULT_PORT: u16 = 9666;

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    // Browser extensions post from arbitrary origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let packages = Router::new()
        .route("/", get(handlers::list_packages))
        .route(
            "/{name}",
            get(handlers::get_package).delete(handlers::delete_package),
        )
        .route("/{name}/filelist", get(handlers::get_file_list))
        .route("/{name}/resubmit", post(handlers::resubmit_package))
        .route("/{name}/redebrid", post(handlers::reprocess_package));

    Router::new()
        .route("/flash", get(handlers::flash_alive))
        .route("/flash/addcrypted2", post(handlers::add_crypted))
        .route("/jdcheck.js", get(handlers::jdcheck))
        .route("/health", get(handlers::health))
        .nest("/api/v1/packages", packages)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// The HTTP server.
pub struct Server {
    router: Router,
    addr: SocketAddr,
}

impl Server {
    /// Creates a server around prepared application state.
    pub fn with_state(
        config: ServerConfig,
        state: AppState,
    ) -> std::result::Result<Self, ServerError> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("invalid address: {}", e)))?;

        Ok(Self {
            router: router(state),
            addr,
        })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Runs the server until the process ends.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the server until `shutdown` completes, then drains open
    /// connections.
    pub async fn run_until<F>(self, shutdown: F) -> std::result::Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind()?;
        info!(addr = %self.addr, "Starting clickndebrid server");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()))?;

        info!("Server stopped");
        Ok(())
    }

    fn bind(&self) -> std::result::Result<tokio::net::TcpListener, ServerError> {
        let bind_err = |e: std::io::Error| ServerError::BindError(self.addr, e);

        let socket = Socket::new(Domain::for_address(self.addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(bind_err)?;
        // Restarts must not wait for lingering TIME_WAIT sockets.
        socket.set_reuse_address(true).map_err(bind_err)?;
        socket.bind(&self.addr.into()).map_err(bind_err)?;
        socket.listen(128).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;

        let std_listener: std::net::TcpListener = socket.into();
        tokio::net::TcpListener::from_std(std_listener).map_err(bind_err)
    }
}
