//! Data model shared by the codec, the batch processor and the cache.
//!
//! Field names serialize in camelCase so cached snapshots stay readable by
//! the admin UI and by older deployments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One Click'n'Load submission, as received and as cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CnlPackage {
    /// Base64 ciphertext of the newline separated link list.
    pub crypted: String,
    /// Key snippet of the form `function f(){ return "<hex>"; }`.
    pub jk: String,
    /// Archive passwords, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passwords: Option<String>,
    /// Page the links were collected from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Package name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Plaintext link list, set once decryption succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decrypted: Option<String>,
    /// Resolution outcome, set once the batch processor ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<ProcessingResult>,
}

impl CnlPackage {
    /// Creates a package from the two mandatory wire fields.
    pub fn new(crypted: impl Into<String>, jk: impl Into<String>) -> Self {
        Self {
            crypted: crypted.into(),
            jk: jk.into(),
            ..Default::default()
        }
    }

    /// Sets the package name.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Sets the source page.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the archive passwords.
    pub fn with_passwords(mut self, passwords: impl Into<String>) -> Self {
        self.passwords = Some(passwords.into());
        self
    }

    /// Returns the package name when one was supplied and is not blank.
    pub fn name(&self) -> Option<&str> {
        self.package
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Returns the number of processed links, zero when not yet resolved.
    pub fn result_count(&self) -> usize {
        self.files.as_ref().map_or(0, |files| files.results.len())
    }

    /// Returns the resolved links that succeeded, in input order.
    pub fn successful_links(&self) -> Vec<&str> {
        self.files
            .iter()
            .flat_map(|files| files.results.iter())
            .filter(|link| link.success)
            .map(|link| link.processed.as_str())
            .collect()
    }
}

/// Outcome of resolving one line of the decrypted payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedLink {
    /// The link as it appeared in the payload.
    pub original: String,
    /// The resolved link, or `original` when resolution failed.
    pub processed: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub processed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
}

impl ProcessedLink {
    /// Creates a successful entry.
    pub fn resolved(
        original: impl Into<String>,
        download: impl Into<String>,
        filename: Option<String>,
        filesize: Option<u64>,
    ) -> Self {
        Self {
            original: original.into(),
            processed: download.into(),
            success: true,
            error: None,
            processed_at: Utc::now(),
            filename,
            filesize,
        }
    }

    /// Creates a failed entry that keeps the original link.
    pub fn failed(original: impl Into<String>, error: impl Into<String>) -> Self {
        let original = original.into();
        Self {
            processed: original.clone(),
            original,
            success: false,
            error: Some(error.into()),
            processed_at: Utc::now(),
            filename: None,
            filesize: None,
        }
    }
}

/// Aggregate statistics of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub processed_at: DateTime<Utc>,
    /// Name of the backend that resolved the batch.
    pub debrid_service: String,
    /// Raw line count, blank lines included.
    pub total_links: usize,
    pub valid_links: usize,
    pub skipped_links: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Percentage of valid links that resolved, `0.0` when there were none.
    pub success_rate: f64,
    pub processing_time_ms: u64,
}

/// Ordered results plus statistics for one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub results: Vec<ProcessedLink>,
    pub stats: ProcessingStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn package_name_ignores_blank() {
        let pkg = CnlPackage::new("c", "jk").with_package("   ");
        assert_eq!(pkg.name(), None);

        let pkg = CnlPackage::new("c", "jk").with_package("My Files");
        assert_eq!(pkg.name(), Some("My Files"));
    }

    #[test]
    fn failed_link_keeps_original() {
        let link = ProcessedLink::failed("http://a/1.zip", "host not supported");
        assert_eq!(link.processed, "http://a/1.zip");
        assert!(!link.success);
        assert_eq!(link.error.as_deref(), Some("host not supported"));
    }

    #[test]
    fn package_serializes_camel_case_and_skips_absent_fields() {
        let pkg = CnlPackage::new("abc", "jk").with_package("pkg1");
        let value = serde_json::to_value(&pkg).unwrap();
        assert_eq!(value, json!({"crypted": "abc", "jk": "jk", "package": "pkg1"}));
    }

    #[test]
    fn stats_use_camel_case_keys() {
        let stats = ProcessingStats {
            processed_at: Utc::now(),
            debrid_service: "realdebrid".into(),
            total_links: 3,
            valid_links: 2,
            skipped_links: 1,
            success_count: 2,
            failure_count: 0,
            success_rate: 100.0,
            processing_time_ms: 5,
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["debridService"], "realdebrid");
        assert_eq!(value["skippedLinks"], 1);
        assert_eq!(value["successRate"], 100.0);
    }

    #[test]
    fn successful_links_filters_failures() {
        let mut pkg = CnlPackage::new("c", "jk");
        pkg.files = Some(ProcessingResult {
            results: vec![
                ProcessedLink::resolved("a", "A", None, None),
                ProcessedLink::failed("b", "boom"),
                ProcessedLink::resolved("c", "C", None, Some(10)),
            ],
            stats: ProcessingStats {
                processed_at: Utc::now(),
                debrid_service: "test".into(),
                total_links: 3,
                valid_links: 3,
                skipped_links: 0,
                success_count: 2,
                failure_count: 1,
                success_rate: 66.6,
                processing_time_ms: 0,
            },
        });
        assert_eq!(pkg.successful_links(), vec!["A", "C"]);
        assert_eq!(pkg.result_count(), 3);
    }
}
