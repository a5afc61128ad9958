use axum::{extract::State, Json};

use super::Overview;
use crate::AppState;

/// Weather, per-barangay risk and boundaries in one payload
///
/// GET /api/v1/overview
#[utoipa::path(get, path = "/api/v1/overview", tag = "overview",
    responses((status = 200, body = Overview)))]
pub async fn get_overview(State(state): State<AppState>) -> Json<Overview> {
    Json(state.hub.overview())
}
