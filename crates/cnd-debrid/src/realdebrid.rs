//! Real-Debrid backend.
//!
//! Only two endpoints are used: `POST /unrestrict/link` to resolve a hoster
//! link and `GET /user` to check the token at startup.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use cnd_core::{DebridBackend, ResolveError, ResolvedLink};

use crate::error::{DebridError, Result};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.real-debrid.com/rest/1.0";

/// Name the backend registers under.
pub const BACKEND_NAME: &str = "realdebrid";

const SERVICE_LABEL: &str = "Real-Debrid";

/// Real-Debrid client settings.
#[derive(Debug, Clone)]
pub struct RealDebridConfig {
    pub api_token: String,
    pub base_url: String,
    /// Client-level request timeout.
    pub timeout: Duration,
}

impl Default for RealDebridConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RealDebridConfig {
    /// Creates a config for the production API.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            ..Default::default()
        }
    }

    /// Points the client at another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Body of a successful `/unrestrict/link` call. Other fields of the
/// answer are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnrestrictResponse {
    #[serde(default)]
    pub download: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub host: Option<String>,
}

/// Error body returned with non-2xx answers.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    error_code: Option<i64>,
}

/// Account returned by `/user`.
#[derive(Debug, Clone, Deserialize)]
pub struct RealDebridUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub points: Option<u64>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    /// `premium` or `free`.
    #[serde(rename = "type")]
    pub account_type: String,
    /// Seconds of premium left.
    #[serde(default)]
    pub premium: u64,
    #[serde(default)]
    pub expiration: Option<String>,
}

impl RealDebridUser {
    pub fn is_premium(&self) -> bool {
        self.account_type == "premium" && self.premium > 0
    }
}

/// Real-Debrid implementation of [`DebridBackend`].
#[derive(Debug, Clone)]
pub struct RealDebridBackend {
    client: reqwest::Client,
    config: RealDebridConfig,
}

impl RealDebridBackend {
    /// Builds the HTTP client.
    pub fn new(config: RealDebridConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::user_agent())
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Fetches the account behind the configured token.
    pub async fn account(&self) -> Result<RealDebridUser> {
        if self.config.api_token.is_empty() {
            return Err(DebridError::Config("Real-Debrid API token is not set".into()));
        }

        let response = self
            .client
            .get(self.url("/user"))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: ApiErrorBody = response.json().await.unwrap_or_default();
            return Err(DebridError::Status {
                status: status.as_u16(),
                message: body.error.unwrap_or_else(|| status.to_string()),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl DebridBackend for RealDebridBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn unrestrict(&self, link: &str) -> std::result::Result<ResolvedLink, ResolveError> {
        let response = self
            .client
            .post(self.url("/unrestrict/link"))
            .bearer_auth(&self.config.api_token)
            .form(&[("link", link)])
            .send()
            .await
            .map_err(|e| ResolveError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: ApiErrorBody = response.json().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                error = ?body.error,
                error_code = ?body.error_code,
                link,
                "Real-Debrid rejected link"
            );
            return Err(ResolveError::Api {
                service: SERVICE_LABEL.to_string(),
                message: body.error.unwrap_or_else(|| status.to_string()),
                code: body.error_code,
            });
        }

        let body: UnrestrictResponse = response
            .json()
            .await
            .map_err(|e| ResolveError::InvalidResponse(format!("Invalid response body: {}", e)))?;

        let download = body
            .download
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ResolveError::InvalidResponse("No download link in response".into()))?;

        debug!(
            link,
            host = ?body.host,
            filename = ?body.filename,
            filesize = ?body.filesize,
            "Real-Debrid unrestricted link"
        );

        Ok(ResolvedLink {
            download,
            filename: body.filename,
            filesize: body.filesize,
        })
    }
}
