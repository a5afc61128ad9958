use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::models::{
    BarangayForecast, PredictionSnapshot, RiskLevel, WeekPrediction, WeeklyPredictions,
};
use crate::barangay::{BarangayError, BarangayInfo};
use crate::extractors::StartDateParam;
use crate::AppState;

/// One barangay's forecast with its display bucket
#[derive(Debug, Serialize, ToSchema)]
pub struct BarangayPrediction {
    pub barangay: String,
    pub current_risk: RiskLevel,
    pub display_tier: RiskLevel,
    pub probability: f64,
    pub degraded: bool,
    pub weekly_forecast: Vec<WeekPrediction>,
}

impl From<BarangayForecast> for BarangayPrediction {
    fn from(forecast: BarangayForecast) -> Self {
        Self {
            display_tier: forecast.display_tier(),
            barangay: forecast.barangay,
            current_risk: forecast.current_risk,
            probability: forecast.probability,
            degraded: forecast.degraded,
            weekly_forecast: forecast.weekly_forecast,
        }
    }
}

/// Latest prediction snapshot for every barangay
///
/// GET /api/v1/predictions
#[utoipa::path(get, path = "/api/v1/predictions", tag = "predictions",
    responses((status = 200, body = PredictionSnapshot)))]
pub async fn get_predictions(State(state): State<AppState>) -> Json<PredictionSnapshot> {
    Json(state.hub.predictions().as_ref().clone())
}

/// Latest forecast for one barangay (name is case-insensitive)
///
/// GET /api/v1/predictions/{barangay}
#[utoipa::path(get, path = "/api/v1/predictions/{barangay}", tag = "predictions",
    params(("barangay" = String, Path)),
    responses((status = 200, body = BarangayPrediction),
              (status = 404, body = crate::error::ErrorResponse)))]
pub async fn get_barangay_prediction(
    State(state): State<AppState>,
    Path(barangay): Path<String>,
) -> Result<Json<BarangayPrediction>, BarangayError> {
    let name = state.registry.require(&barangay)?;
    let forecast = state
        .hub
        .predictions()
        .get(name)
        .cloned()
        .unwrap_or_else(|| BarangayForecast::fallback(name));

    Ok(Json(forecast.into()))
}

/// Risk label per week, starting today unless `start_date` is given
///
/// GET /api/v1/predictions/{barangay}/weekly?start_date=2024-06-01
#[utoipa::path(get, path = "/api/v1/predictions/{barangay}/weekly", tag = "predictions",
    params(("barangay" = String, Path),
           ("start_date" = Option<String>, Query, description = "YYYY-MM-DD")),
    responses((status = 200, body = WeeklyPredictions),
              (status = 400, body = crate::error::ErrorResponse),
              (status = 404, body = crate::error::ErrorResponse)))]
pub async fn get_weekly_predictions(
    State(state): State<AppState>,
    Path(barangay): Path<String>,
    StartDateParam(start): StartDateParam,
) -> Result<Json<WeeklyPredictions>, BarangayError> {
    let name = state.registry.require(&barangay)?;
    let start = start.unwrap_or_else(|| state.prediction_service.today());

    Ok(Json(
        state.prediction_service.weekly_predictions(name, start).await,
    ))
}

/// Enumerated barangays and their centroids
///
/// GET /api/v1/barangays
#[utoipa::path(get, path = "/api/v1/barangays", tag = "predictions",
    responses((status = 200, body = [BarangayInfo])))]
pub async fn list_barangays(State(state): State<AppState>) -> Json<Vec<BarangayInfo>> {
    Json(state.registry.list())
}
