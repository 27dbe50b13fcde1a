//! Link resolution through named debrid backends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Default upper bound for a single backend call.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Direct download information returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub download: String,
    pub filename: Option<String>,
    pub filesize: Option<u64>,
}

/// Errors from a backend call.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The service rejected the link (unsupported host, bad token, ...).
    #[error("{service} API error: {message} ({})", code_label(.code))]
    Api {
        service: String,
        message: String,
        code: Option<i64>,
    },

    /// The service answered, but not with something usable.
    #[error("{0}")]
    InvalidResponse(String),

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The backend did not answer in time.
    #[error("link resolution timed out after {0:?}")]
    Timeout(Duration),
}

fn code_label(code: &Option<i64>) -> String {
    code.map_or_else(|| "unknown code".to_string(), |c| c.to_string())
}

/// A debrid/unrestrict service able to turn a hoster link into a direct link.
#[async_trait]
pub trait DebridBackend: Send + Sync {
    /// Name used to select this backend in configuration.
    fn name(&self) -> &str;

    /// Resolves one link. Implementations must not retry.
    async fn unrestrict(&self, link: &str) -> Result<ResolvedLink, ResolveError>;
}

/// Registry of backends keyed by lower-case name, with a default.
#[derive(Clone)]
pub struct LinkResolver {
    backends: HashMap<String, Arc<dyn DebridBackend>>,
    default: String,
    timeout: Duration,
}

impl std::fmt::Debug for LinkResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkResolver")
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .field("default", &self.default)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LinkResolver {
    /// Creates a resolver whose default backend is `backend`.
    pub fn new(backend: Arc<dyn DebridBackend>) -> Self {
        let default = backend.name().to_lowercase();
        let mut backends = HashMap::new();
        backends.insert(default.clone(), backend);
        Self {
            backends,
            default,
            timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    /// Registers an additional backend.
    pub fn with_backend(mut self, backend: Arc<dyn DebridBackend>) -> Self {
        self.backends.insert(backend.name().to_lowercase(), backend);
        self
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the default backend name.
    pub fn default_name(&self) -> &str {
        &self.default
    }

    /// Returns whether a backend is registered under `name`.
    pub fn supports(&self, name: &str) -> bool {
        self.backends.contains_key(&name.to_lowercase())
    }

    /// Looks up a backend, falling back to the default for unknown names.
    pub fn backend(&self, name: &str) -> Arc<dyn DebridBackend> {
        if let Some(backend) = self.backends.get(&name.to_lowercase()) {
            return Arc::clone(backend);
        }

        error!(service = name, "Invalid debrid service specified");
        warn!("Falling back to {}", self.default);
        Arc::clone(&self.backends[&self.default])
    }

    /// Resolves `link` with `backend`, bounded by the configured timeout.
    pub async fn resolve_with(
        &self,
        backend: &dyn DebridBackend,
        link: &str,
    ) -> Result<ResolvedLink, ResolveError> {
        debug!(backend = backend.name(), link, "Resolving link");
        match tokio::time::timeout(self.timeout, backend.unrestrict(link)).await {
            Ok(result) => result,
            Err(_) => Err(ResolveError::Timeout(self.timeout)),
        }
    }

    /// Resolves `link` with the backend registered under `name`.
    pub async fn resolve(&self, name: &str, link: &str) -> Result<ResolvedLink, ResolveError> {
        let backend = self.backend(name);
        self.resolve_with(backend.as_ref(), link).await
    }
}
