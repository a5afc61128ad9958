use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use super::models::{DailyForecast, WeatherSnapshot};
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// false when running on simulated weather only
    pub weather_provider: bool,
    /// Weather provider calls left today
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_calls_remaining: Option<u32>,
}

/// Health check endpoint
#[utoipa::path(get, path = "/health", tag = "health",
    responses((status = 200, body = HealthResponse)))]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        weather_provider: state.weather_service.has_provider(),
        weather_calls_remaining: state.weather_service.calls_remaining(),
    })
}

/// Latest shared weather snapshot
///
/// GET /api/v1/weather
#[utoipa::path(get, path = "/api/v1/weather", tag = "weather",
    responses((status = 200, body = WeatherSnapshot)))]
pub async fn get_weather(State(state): State<AppState>) -> Json<WeatherSnapshot> {
    Json(state.hub.weather().as_ref().clone())
}

/// Latest shared seven-day outlook, one entry per local day
///
/// GET /api/v1/weather/forecast
#[utoipa::path(get, path = "/api/v1/weather/forecast", tag = "weather",
    responses((status = 200, body = [DailyForecast])))]
pub async fn get_forecast(State(state): State<AppState>) -> Json<Vec<DailyForecast>> {
    Json(state.hub.outlook().days.clone())
}
