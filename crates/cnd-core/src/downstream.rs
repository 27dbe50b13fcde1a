//! Submission of re-encrypted packages to the download manager.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::CnlPackage;

/// The five-field `addcrypted2` form, as posted downstream and as returned
/// to the CNL caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub jk: String,
    pub crypted: String,
    pub passwords: String,
    pub source: String,
    pub package: String,
}

impl From<&CnlPackage> for Submission {
    fn from(pkg: &CnlPackage) -> Self {
        Self {
            jk: pkg.jk.clone(),
            crypted: pkg.crypted.clone(),
            passwords: pkg.passwords.clone().unwrap_or_default(),
            source: pkg.source.clone().unwrap_or_default(),
            package: pkg.package.clone().unwrap_or_default(),
        }
    }
}

/// Errors from a downstream submission.
#[derive(Debug, Error)]
pub enum DownstreamError {
    /// Non-2xx answer.
    #[error("HTTP error! status: {0}")]
    Status(u16),

    /// Transport failure.
    #[error("downstream request failed: {0}")]
    Http(String),
}

/// A CNL-speaking service accepting `addcrypted2` submissions.
#[async_trait]
pub trait Downstream: Send + Sync {
    /// Posts one submission.
    async fn submit(&self, submission: &Submission) -> Result<(), DownstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_metadata_becomes_empty() {
        let pkg = CnlPackage::new("c", "jk").with_package("pkg1");
        let form = Submission::from(&pkg);

        assert_eq!(form.crypted, "c");
        assert_eq!(form.package, "pkg1");
        assert_eq!(form.passwords, "");
        assert_eq!(form.source, "");
    }

    #[test]
    fn status_error_message() {
        assert_eq!(
            DownstreamError::Status(502).to_string(),
            "HTTP error! status: 502"
        );
    }
}
