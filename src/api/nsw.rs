use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::{ApiError, AppState, ErrorResponse};
use crate::models::{ServiceAlert, TripUpdate, VehiclePosition};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(realtime))
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct RealtimeResponse {
    pub vehicle_positions: Vec<VehiclePosition>,
    pub trip_updates: Vec<TripUpdate>,
    pub alerts: Vec<ServiceAlert>,
}

/// Transport for NSW realtime feed.
///
/// GTFS-realtime payloads are not decoded; a configured key yields empty feeds.
#[utoipa::path(
    get,
    path = "/api/nsw/realtime",
    responses(
        (status = 200, description = "Realtime feed contents", body = RealtimeResponse),
        (status = 500, description = "No API key configured", body = ErrorResponse)
    ),
    tag = "nsw"
)]
pub async fn realtime(State(state): State<AppState>) -> Result<Json<RealtimeResponse>, ApiError> {
    if state.nsw_api_key.is_none() {
        warn!("NSW realtime requested without an API key");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "NSW Transport API key not configured".to_string(),
                details: None,
            }),
        ));
    }
    Ok(Json(RealtimeResponse::default()))
}
