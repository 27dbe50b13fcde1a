//! Route handlers.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use tracing::{debug, error};

use cnd_core::CnlPackage;

use crate::error::Result;
use crate::models::{
    ApiResponse, CnlForm, HealthResponse, ListQuery, MessageResponse, Page, ReprocessResponse,
    ResubmitResponse,
};
use crate::service::PageRequest;
use crate::state::AppState;

/// Plain-text body of every failed CNL submission.
pub const CNL_FAILURE_MESSAGE: &str = "Error processing encrypted request";

const JDCHECK_BODY: &str = "jdownloader=true;\nvar version='42707';";

/// POST /flash/addcrypted2 - Resolve and forward an encrypted link list.
pub async fn add_crypted(State(state): State<AppState>, Form(form): Form<CnlForm>) -> Response {
    debug!(package = ?form.package, "Received addcrypted2 request");

    match state.service.handle_submission(CnlPackage::from(form)).await {
        Ok(submission) => Json(submission).into_response(),
        Err(e) => {
            error!(error = %e, "Error processing encrypted request");
            (StatusCode::INTERNAL_SERVER_ERROR, CNL_FAILURE_MESSAGE).into_response()
        }
    }
}

/// GET /flash - Liveness check of CNL clients.
pub async fn flash_alive() -> &'static str {
    "JDownloader"
}

/// GET /jdcheck.js - Capability check of browser extensions.
pub async fn jdcheck() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], JDCHECK_BODY)
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/v1/packages - Paginated listing, newest first.
pub async fn list_packages(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Page>>> {
    let request = PageRequest::parse(query.page.as_deref(), query.page_size.as_deref())?;
    let page = state.service.list_packages(request).await;
    Ok(Json(ApiResponse::ok(page)))
}

/// GET /api/v1/packages/{name}
pub async fn get_package(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<CnlPackage>>> {
    let pkg = state.service.get_package(&name).await?;
    Ok(Json(ApiResponse::ok(pkg)))
}

/// GET /api/v1/packages/{name}/filelist - Download list as a text file.
pub async fn get_file_list(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response> {
    let list = state.service.get_file_list(&name).await?;
    let disposition = format!("attachment; filename=\"{}\"", list.filename);

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        list.body,
    )
        .into_response())
}

/// POST /api/v1/packages/{name}/resubmit - Replay the cached ciphertext.
pub async fn resubmit_package(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<ResubmitResponse>>> {
    let submission = state.service.resubmit_package(&name).await?;
    Ok(Json(ApiResponse::ok(ResubmitResponse {
        message: "Package resubmitted successfully".to_string(),
        response: submission.crypted,
    })))
}

/// POST /api/v1/packages/{name}/redebrid - Resolve the links again.
pub async fn reprocess_package(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<ReprocessResponse>>> {
    let reprocessed = state.service.reprocess_package(&name).await?;
    Ok(Json(ApiResponse::ok(ReprocessResponse {
        message: "Package re-processed successfully".to_string(),
        package: reprocessed.package,
        version: reprocessed.version,
    })))
}

/// DELETE /api/v1/packages/{name}
pub async fn delete_package(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>> {
    state.service.delete_package(&name).await?;
    Ok(Json(ApiResponse::ok(MessageResponse {
        message: format!("Package {} deleted successfully", name),
    })))
}
