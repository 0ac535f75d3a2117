use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::{
    bad_request, invalid_input, not_found, rejected_body, ApiError, AppState, ErrorResponse,
};
use crate::models::{NewStop, Stop, StopUpdate};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_stops, create_stop))
        .routes(routes!(nearby_stops))
        .routes(routes!(get_stop, update_stop))
}

/// List all stops
#[utoipa::path(
    get,
    path = "/api/stops",
    responses(
        (status = 200, description = "All stops ordered by id", body = Vec<Stop>)
    ),
    tag = "stops"
)]
pub async fn list_stops(State(state): State<AppState>) -> Json<Vec<Stop>> {
    Json(state.store.list_stops().await)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NearbyQuery {
    /// Latitude of the search center
    pub lat: Option<f64>,
    /// Longitude of the search center
    pub lng: Option<f64>,
    /// Search radius in degrees (default 1)
    pub radius: Option<f64>,
}

/// Stops within a radius of a point
#[utoipa::path(
    get,
    path = "/api/stops/nearby",
    params(NearbyQuery),
    responses(
        (status = 200, description = "Stops within the radius", body = Vec<Stop>),
        (status = 400, description = "Missing coordinates", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn nearby_stops(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<Stop>>, ApiError> {
    let (Some(lat), Some(lng)) = (query.lat, query.lng) else {
        return Err(bad_request("Latitude and longitude are required"));
    };
    Ok(Json(state.store.nearby_stops(lat, lng, query.radius).await))
}

/// Get a single stop
#[utoipa::path(
    get,
    path = "/api/stops/{stop_id}",
    params(
        ("stop_id" = String, Path, description = "Stop ID")
    ),
    responses(
        (status = 200, description = "Stop found", body = Stop),
        (status = 404, description = "Stop not found", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn get_stop(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
) -> Result<Json<Stop>, ApiError> {
    state
        .store
        .get_stop(&stop_id)
        .await
        .map(Json)
        .ok_or_else(|| not_found("Stop"))
}

/// Create a stop
#[utoipa::path(
    post,
    path = "/api/stops",
    request_body = NewStop,
    responses(
        (status = 200, description = "Created stop", body = Stop),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn create_stop(
    State(state): State<AppState>,
    payload: Result<Json<NewStop>, JsonRejection>,
) -> Result<Json<Stop>, ApiError> {
    let Json(input) = payload.map_err(rejected_body)?;
    let stop = state.store.create_stop(input).await.map_err(invalid_input)?;
    Ok(Json(stop))
}

/// Partially update a stop
#[utoipa::path(
    patch,
    path = "/api/stops/{stop_id}",
    params(
        ("stop_id" = String, Path, description = "Stop ID")
    ),
    request_body = StopUpdate,
    responses(
        (status = 200, description = "Updated stop", body = Stop),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Stop not found", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn update_stop(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
    payload: Result<Json<StopUpdate>, JsonRejection>,
) -> Result<Json<Stop>, ApiError> {
    let Json(update) = payload.map_err(rejected_body)?;
    state
        .store
        .update_stop(&stop_id, update)
        .await
        .map_err(invalid_input)?
        .map(Json)
        .ok_or_else(|| not_found("Stop"))
}
