//! Package service: the submission pipeline and operations over cached
//! packages.
//!
//! ```text
//! Received → Decrypted → Resolved → Encrypted → [Cached] → Submitted
//! ```
//!
//! Cached snapshots live under `package:<name>:<timestamp>`; the part after
//! the prefix is the package id used by the HTTP API. Reprocessing never
//! overwrites a snapshot, it adds a newer one for the same base name.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use cnd_core::codec::{self, CodecError};
use cnd_core::{
    BatchError, BatchProcessor, CnlPackage, Downstream, DownstreamError, ProcessingResult,
    Submission,
};
use cnd_storage::Cache;

use crate::models::{Page, PackageSummary, Pagination};

/// Cache key prefix of package snapshots.
pub const PACKAGE_PREFIX: &str = "package:";

/// Timestamp suffix format, always 24 characters.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

const TIMESTAMP_LEN: usize = 24;

/// Default page size of the package listing.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: usize = 50;

/// Service errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Batch(#[from] BatchError),

    #[error("{0}")]
    Downstream(#[from] DownstreamError),

    /// No snapshot under the requested id.
    #[error("Package not found")]
    NotFound(String),

    /// The snapshot has no resolution results.
    #[error("Package was empty")]
    EmptyPackage(String),

    /// Bad request parameters.
    #[error("{0}")]
    Validation(String),
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Service settings.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Backend name handed to the batch processor.
    pub debrid_service: String,
    /// Page size used when walking the cache key space.
    pub scan_count: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            debrid_service: "realdebrid".to_string(),
            scan_count: 100,
        }
    }
}

/// Validated pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Parses raw query values. Absent or empty values take the defaults.
    pub fn parse(page: Option<&str>, page_size: Option<&str>) -> Result<Self> {
        let page = match page.map(str::trim).filter(|p| !p.is_empty()) {
            None => 1,
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|&p| p >= 1)
                .ok_or_else(|| ServiceError::Validation("Invalid page parameter".into()))?,
        };

        let page_size = match page_size.map(str::trim).filter(|p| !p.is_empty()) {
            None => DEFAULT_PAGE_SIZE,
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|size| (1..=MAX_PAGE_SIZE).contains(size))
                .ok_or_else(|| {
                    ServiceError::Validation(format!(
                        "Invalid pageSize parameter (must be between 1 and {})",
                        MAX_PAGE_SIZE
                    ))
                })?,
        };

        Ok(Self { page, page_size })
    }
}

/// Download list derived from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileList {
    /// File name offered to the browser.
    pub filename: String,
    /// Successfully resolved links, one per line.
    pub body: String,
}

/// Outcome of a reprocess.
#[derive(Debug, Clone)]
pub struct Reprocessed {
    /// Id of the new snapshot.
    pub version: String,
    pub package: CnlPackage,
}

/// Splits a package id into its base name and timestamp suffix.
pub fn split_id(id: &str) -> (&str, Option<&str>) {
    if id.len() > TIMESTAMP_LEN && id.is_char_boundary(id.len() - TIMESTAMP_LEN) {
        let (head, ts) = id.split_at(id.len() - TIMESTAMP_LEN);
        if let Some(base) = head.strip_suffix(':') {
            if NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).is_ok() {
                return (base, Some(ts));
            }
        }
    }
    (id, None)
}

/// Returns the cache key of a package id.
pub fn package_key(id: &str) -> String {
    format!("{}{}", PACKAGE_PREFIX, id)
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Orchestrates codec, batch processor, cache and downstream.
pub struct PackageService {
    batch: BatchProcessor,
    cache: Cache,
    downstream: Arc<dyn Downstream>,
    config: ServiceConfig,
}

impl std::fmt::Debug for PackageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageService")
            .field("batch", &self.batch)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PackageService {
    pub fn new(
        batch: BatchProcessor,
        cache: Cache,
        downstream: Arc<dyn Downstream>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            batch,
            cache,
            downstream,
            config,
        }
    }

    /// Returns the cache handle.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Handles one inbound `addcrypted2` submission and returns the
    /// re-encrypted form that was forwarded downstream.
    pub async fn handle_submission(&self, pkg: CnlPackage) -> Result<Submission> {
        let decrypted = codec::decrypt(&pkg)?;
        let text = decrypted.decrypted.clone().unwrap_or_default();

        let files = self.resolve(&text).await?;
        let resolved = CnlPackage {
            files: Some(files),
            ..decrypted
        };
        let encrypted = codec::encrypt(&resolved)?;

        if encrypted.result_count() > 0 {
            match encrypted.name() {
                Some(name) => {
                    self.store_snapshot(name, &encrypted).await;
                }
                None => debug!("Submission has no package name, not caching"),
            }
        }

        let submission = Submission::from(&encrypted);
        self.downstream.submit(&submission).await.map_err(|e| {
            error!(package = ?encrypted.package, error = %e, "Destination submission failed");
            e
        })?;

        info!(
            package = ?encrypted.package,
            links = encrypted.result_count(),
            "Submission forwarded"
        );
        Ok(submission)
    }

    /// Lists cached packages, newest first.
    pub async fn list_packages(&self, request: PageRequest) -> Page {
        let pattern = format!("{}*", PACKAGE_PREFIX);
        let mut keys = self.cache.scan_all(&pattern, self.config.scan_count).await;
        keys.sort_by(|a, b| {
            let ts_a = split_id(&a[PACKAGE_PREFIX.len()..]).1;
            let ts_b = split_id(&b[PACKAGE_PREFIX.len()..]).1;
            ts_b.cmp(&ts_a).then_with(|| a.cmp(b))
        });

        let total_items = keys.len();
        let total_pages = total_items.div_ceil(request.page_size);
        let start = (request.page - 1)
            .saturating_mul(request.page_size)
            .min(total_items);
        let end = start.saturating_add(request.page_size).min(total_items);

        let mut data = Vec::with_capacity(end - start);
        for key in &keys[start..end] {
            if let Some(pkg) = self.cache.get::<CnlPackage>(key).await {
                let id = &key[PACKAGE_PREFIX.len()..];
                data.push(PackageSummary::from_snapshot(id, pkg));
            }
        }

        Page {
            data,
            pagination: Pagination {
                page: request.page,
                page_size: request.page_size,
                total_items,
                total_pages,
                has_more: request.page < total_pages,
            },
        }
    }

    /// Loads one snapshot.
    pub async fn get_package(&self, id: &str) -> Result<CnlPackage> {
        self.cache
            .get(&package_key(id))
            .await
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    /// Removes one snapshot.
    pub async fn delete_package(&self, id: &str) -> Result<()> {
        let key = package_key(id);
        if !self.cache.exists(&key).await {
            return Err(ServiceError::NotFound(id.to_string()));
        }
        self.cache.delete(&key).await;
        info!(package = id, "Package deleted");
        Ok(())
    }

    /// Builds the download list of successfully resolved links.
    pub async fn get_file_list(&self, id: &str) -> Result<FileList> {
        let pkg = self.get_package(id).await?;
        if pkg.files.is_none() {
            return Err(ServiceError::EmptyPackage(id.to_string()));
        }

        Ok(FileList {
            filename: format!("{}-filelist.txt", id),
            body: pkg.successful_links().join("\n"),
        })
    }

    /// Posts the cached ciphertext downstream again. The snapshot is left
    /// untouched whatever the outcome.
    pub async fn resubmit_package(&self, id: &str) -> Result<Submission> {
        let pkg = self.get_package(id).await?;
        let submission = Submission::from(&pkg);

        self.downstream.submit(&submission).await.map_err(|e| {
            error!(package = id, error = %e, "Resubmission failed");
            e
        })?;

        info!(package = id, "Package resubmitted");
        Ok(submission)
    }

    /// Resolves the cached links again and stores the outcome as a new
    /// snapshot of the same base name.
    pub async fn reprocess_package(&self, id: &str) -> Result<Reprocessed> {
        let cached = self.get_package(id).await?;
        let (base, _) = split_id(id);

        let text = match cached.decrypted.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => cached
                .files
                .iter()
                .flat_map(|files| files.results.iter())
                .map(|link| link.original.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        };

        let files = self.resolve(&text).await?;
        let updated = codec::encrypt(&CnlPackage {
            files: Some(files),
            ..cached
        })?;

        let version = self.store_snapshot(base, &updated).await;
        info!(package = id, version = %version, "Package reprocessed");

        Ok(Reprocessed {
            version,
            package: updated,
        })
    }

    async fn resolve(&self, text: &str) -> Result<ProcessingResult> {
        Ok(self.batch.process(text, &self.config.debrid_service).await?)
    }

    /// Stores `pkg` under a fresh timestamped key for `base` and returns the
    /// new package id. Storage failures are logged only.
    async fn store_snapshot(&self, base: &str, pkg: &CnlPackage) -> String {
        let mut at = Utc::now();
        let mut id = format!("{}:{}", base, format_timestamp(at));
        while self.cache.exists(&package_key(&id)).await {
            at += ChronoDuration::milliseconds(1);
            id = format!("{}:{}", base, format_timestamp(at));
        }

        if self.cache.set(&package_key(&id), pkg, None).await {
            debug!(package = %id, "Cached package snapshot");
        } else {
            warn!(package = %id, "Failed to cache package snapshot");
        }
        id
    }
}
