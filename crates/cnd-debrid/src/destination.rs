//! Downstream CNL destination client.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use cnd_core::{Downstream, DownstreamError, Submission};

use crate::error::Result;

/// Default downstream base URL.
pub const DEFAULT_DESTINATION_URL: &str = "http://localhost:8000";

/// Path of the CNL submission endpoint.
pub const ADDCRYPTED2_PATH: &str = "/flash/addcrypted2";

/// Downstream settings.
#[derive(Debug, Clone)]
pub struct DestinationConfig {
    /// Base URL of the download manager's CNL listener.
    pub url: String,
    pub timeout: Duration,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DESTINATION_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl DestinationConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Full submission URL.
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), ADDCRYPTED2_PATH)
    }
}

/// Posts `addcrypted2` forms over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDownstream {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDownstream {
    pub fn new(config: DestinationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::user_agent())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Downstream for HttpDownstream {
    async fn submit(&self, submission: &Submission) -> std::result::Result<(), DownstreamError> {
        debug!(endpoint = %self.endpoint, package = %submission.package, "Submitting to destination");

        let response = self
            .client
            .post(&self.endpoint)
            .form(submission)
            .send()
            .await
            .map_err(|e| DownstreamError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            error!(
                endpoint = %self.endpoint,
                status = status.as_u16(),
                "Destination rejected submission"
            );
            return Err(DownstreamError::Status(status.as_u16()));
        }

        Ok(())
    }
}
