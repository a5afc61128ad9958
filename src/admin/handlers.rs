use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::models::{CaseReport, Insights, UploadKind, UploadsResponse};
use super::service::{AdminError, BackendError};
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct UploadQuery {
    /// Original file name, forwarded to the backend
    pub filename: Option<String>,
}

/// Submit a case report
///
/// POST /api/v1/reports
#[utoipa::path(post, path = "/api/v1/reports", tag = "admin",
    request_body = CaseReport,
    responses((status = 200, description = "Backend answer, passed through"),
              (status = 400, body = crate::error::ErrorResponse)))]
pub async fn submit_report(
    State(state): State<AppState>,
    Json(report): Json<CaseReport>,
) -> Result<Json<serde_json::Value>, AdminError> {
    let body = state.admin_service.submit_report(report).await?;
    Ok(Json(body))
}

/// Case reports with analytics
///
/// GET /api/v1/reports
#[utoipa::path(get, path = "/api/v1/reports", tag = "admin",
    responses((status = 200, description = "Backend answer, passed through")))]
pub async fn list_reports(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, BackendError> {
    Ok(Json(state.admin_service.case_reports().await?))
}

/// Uploaded data files
///
/// GET /api/v1/uploads
#[utoipa::path(get, path = "/api/v1/uploads", tag = "admin",
    responses((status = 200, body = UploadsResponse)))]
pub async fn list_uploads(
    State(state): State<AppState>,
) -> Result<Json<UploadsResponse>, BackendError> {
    Ok(Json(state.admin_service.uploads().await?))
}

/// Upload a climate or dengue CSV. The request body is the raw file.
///
/// POST /api/v1/uploads/{kind}?filename=cases.csv
#[utoipa::path(post, path = "/api/v1/uploads/{kind}", tag = "admin",
    params(("kind" = String, Path, description = "climate or dengue"), UploadQuery),
    request_body(content = String, content_type = "text/csv"),
    responses((status = 200, description = "Backend answer, passed through"),
              (status = 404, body = crate::error::ErrorResponse)))]
pub async fn upload(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AdminError> {
    let kind = UploadKind::from_path(&kind).ok_or(AdminError::UnknownUploadKind(kind))?;
    let filename = query
        .filename
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| format!("{}.csv", kind.as_str()));

    let response = state.admin_service.upload(kind, &filename, body).await?;
    Ok(Json(response))
}

/// Retrain the prediction model on the latest data
///
/// POST /api/v1/model/retrain
#[utoipa::path(post, path = "/api/v1/model/retrain", tag = "admin",
    responses((status = 200, description = "Backend answer, passed through")))]
pub async fn retrain(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, BackendError> {
    Ok(Json(state.admin_service.retrain().await?))
}

/// Short notes on current dengue risk conditions
///
/// GET /api/v1/insights
#[utoipa::path(get, path = "/api/v1/insights", tag = "admin",
    responses((status = 200, body = Insights)))]
pub async fn get_insights(State(state): State<AppState>) -> Json<Insights> {
    Json(state.admin_service.insights().await)
}
