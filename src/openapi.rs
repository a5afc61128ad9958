use axum::Json;
use utoipa::OpenApi;

use crate::admin::handlers as admin_handlers;
use crate::admin::models::{CaseReport, Insights, UploadEntry, UploadKind, UploadsResponse};
use crate::barangay::{BarangayInfo, Centroid};
use crate::boundary::handlers as boundary_handlers;
use crate::boundary::{BoundaryPolygon, BoundarySnapshot, Provenance};
use crate::error::ErrorResponse;
use crate::hub::handlers as hub_handlers;
use crate::hub::{BarangayOverview, Overview};
use crate::prediction::handlers::{self as prediction_handlers, BarangayPrediction};
use crate::prediction::models::{
    BarangayForecast, Climate, ClimateOrigin, ClimateUsed, PredictionSnapshot, RiskLevel,
    WeekPrediction, WeeklyPredictions,
};
use crate::weather::handlers::{self as weather_handlers, HealthResponse};
use crate::weather::models::{DailyForecast, DataSource, WeatherCondition, WeatherSnapshot};

/// OpenAPI documentation for the mosKITA data service
#[derive(OpenApi)]
#[openapi(
    info(
        title = "mosKITA API",
        version = "1.0.0",
        description = "Shared weather, dengue-risk prediction and barangay boundary snapshots for Naga City, plus the administrative write paths of the prediction backend.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        weather_handlers::health,
        weather_handlers::get_weather,
        weather_handlers::get_forecast,
        prediction_handlers::get_predictions,
        prediction_handlers::get_barangay_prediction,
        prediction_handlers::get_weekly_predictions,
        prediction_handlers::list_barangays,
        boundary_handlers::get_boundaries,
        hub_handlers::get_overview,
        admin_handlers::submit_report,
        admin_handlers::list_reports,
        admin_handlers::list_uploads,
        admin_handlers::upload,
        admin_handlers::retrain,
        admin_handlers::get_insights,
    ),
    tags(
        (name = "health", description = "Service health"),
        (name = "weather", description = "Current weather and 7-day outlook"),
        (name = "predictions", description = "Dengue risk per barangay"),
        (name = "boundaries", description = "Barangay polygons"),
        (name = "overview", description = "Combined heatmap payload"),
        (name = "admin", description = "Case reports, data uploads and model retraining")
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            WeatherSnapshot,
            WeatherCondition,
            DataSource,
            DailyForecast,
            Climate,
            ClimateOrigin,
            ClimateUsed,
            RiskLevel,
            WeekPrediction,
            BarangayForecast,
            BarangayPrediction,
            PredictionSnapshot,
            WeeklyPredictions,
            BarangayInfo,
            Centroid,
            Provenance,
            BoundaryPolygon,
            BoundarySnapshot,
            BarangayOverview,
            Overview,
            CaseReport,
            UploadKind,
            UploadEntry,
            UploadsResponse,
            Insights,
        )
    )
)]
pub struct ApiDoc;

/// Serve the generated OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/health",
            "/api/v1/weather",
            "/api/v1/weather/forecast",
            "/api/v1/predictions",
            "/api/v1/predictions/{barangay}",
            "/api/v1/predictions/{barangay}/weekly",
            "/api/v1/barangays",
            "/api/v1/boundaries",
            "/api/v1/overview",
            "/api/v1/reports",
            "/api/v1/uploads",
            "/api/v1/uploads/{kind}",
            "/api/v1/model/retrain",
            "/api/v1/insights",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
