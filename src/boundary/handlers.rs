use axum::{extract::State, Json};

use super::models::BoundarySnapshot;
use crate::AppState;

/// Barangay polygons, real where OpenStreetMap has them
///
/// GET /api/v1/boundaries
#[utoipa::path(get, path = "/api/v1/boundaries", tag = "boundaries",
    responses((status = 200, body = BoundarySnapshot)))]
pub async fn get_boundaries(State(state): State<AppState>) -> Json<BoundarySnapshot> {
    Json(state.hub.boundaries().as_ref().clone())
}
