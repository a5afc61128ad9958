use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Router,
};

use crate::admin::handlers as admin_handlers;
use crate::boundary::handlers as boundary_handlers;
use crate::hub::handlers as hub_handlers;
use crate::openapi::openapi_json;
use crate::prediction::handlers as prediction_handlers;
use crate::weather::handlers as weather_handlers;
use crate::AppState;

/// CSV uploads can be larger than axum's 2 MB default
const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024;

/// Build the weather API routes
fn weather_routes() -> Router<AppState> {
    Router::new()
        .route("/weather", get(weather_handlers::get_weather))
        .route("/weather/forecast", get(weather_handlers::get_forecast))
}

/// Build the prediction API routes
fn prediction_routes() -> Router<AppState> {
    Router::new()
        .route("/predictions", get(prediction_handlers::get_predictions))
        .route(
            "/predictions/{barangay}",
            get(prediction_handlers::get_barangay_prediction),
        )
        .route(
            "/predictions/{barangay}/weekly",
            get(prediction_handlers::get_weekly_predictions),
        )
        .route("/barangays", get(prediction_handlers::list_barangays))
}

/// Build the map API routes
fn map_routes() -> Router<AppState> {
    Router::new()
        .route("/boundaries", get(boundary_handlers::get_boundaries))
        .route("/overview", get(hub_handlers::get_overview))
}

/// Build the admin API routes (forwarded to the prediction backend)
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/reports",
            get(admin_handlers::list_reports).post(admin_handlers::submit_report),
        )
        .route("/uploads", get(admin_handlers::list_uploads))
        .route(
            "/uploads/{kind}",
            post(admin_handlers::upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/model/retrain", post(admin_handlers::retrain))
        .route("/insights", get(admin_handlers::get_insights))
}

/// Build all API v1 routes
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(weather_routes())
        .merge(prediction_routes())
        .merge(map_routes())
        .merge(admin_routes())
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Build the complete application router
pub fn build_router() -> Router<AppState> {
    Router::new()
        // Health check at root level
        .route("/", get(weather_handlers::health))
        .route("/health", get(weather_handlers::health))
        // API v1 routes
        .nest("/api/v1", api_v1_routes())
        .route("/api-docs/openapi.json", get(openapi_json))
        .route("/metrics", get(metrics))
}
