//! API request and response models.

use serde::{Deserialize, Serialize};

use cnd_core::{CnlPackage, ProcessingResult};

/// JSON envelope of every package API answer.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Form body of `POST /flash/addcrypted2`. Missing fields read as empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CnlForm {
    #[serde(default)]
    pub crypted: String,
    #[serde(default)]
    pub jk: String,
    #[serde(default)]
    pub passwords: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
}

impl From<CnlForm> for CnlPackage {
    fn from(form: CnlForm) -> Self {
        Self {
            crypted: form.crypted,
            jk: form.jk,
            passwords: form.passwords,
            source: form.source,
            package: form.package,
            ..Default::default()
        }
    }
}

/// Query parameters of `GET /api/v1/packages`. Kept as raw strings so
/// malformed values produce a validation message instead of a generic
/// rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

/// Listing entry: the snapshot without key material or plaintext, with
/// `package` replaced by the package id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSummary {
    pub package: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passwords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<ProcessingResult>,
}

impl PackageSummary {
    pub fn from_snapshot(id: &str, pkg: CnlPackage) -> Self {
        Self {
            package: id.to_string(),
            passwords: pkg.passwords,
            source: pkg.source,
            files: pkg.files,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_more: bool,
}

/// One page of the package listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub data: Vec<PackageSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ResubmitResponse {
    pub message: String,
    /// Ciphertext posted downstream.
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct ReprocessResponse {
    pub message: String,
    pub package: CnlPackage,
    /// Id of the snapshot created by the reprocess.
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
