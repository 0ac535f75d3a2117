use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::vehicles::ReplaceResponse;
use crate::api::{invalid_input, not_found, rejected_body, ApiError, AppState, ErrorResponse};
use crate::models::{NewTripUpdate, TripUpdate};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_trip_updates, create_trip_update, replace_trip_updates))
        .routes(routes!(arrivals_for_stop))
        .routes(routes!(get_trip_update))
}

/// Raw trip updates for a stop, unordered and unfiltered
#[utoipa::path(
    get,
    path = "/api/arrivals/stop/{stop_id}",
    params(
        ("stop_id" = String, Path, description = "Stop ID")
    ),
    responses(
        (status = 200, description = "Trip updates for the stop", body = Vec<TripUpdate>)
    ),
    tag = "arrivals"
)]
pub async fn arrivals_for_stop(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
) -> Json<Vec<TripUpdate>> {
    Json(state.store.trip_updates_for_stop(&stop_id).await)
}

#[utoipa::path(
    get,
    path = "/api/arrivals",
    responses(
        (status = 200, description = "All trip updates", body = Vec<TripUpdate>)
    ),
    tag = "arrivals"
)]
pub async fn list_trip_updates(State(state): State<AppState>) -> Json<Vec<TripUpdate>> {
    Json(state.store.list_trip_updates().await)
}

#[utoipa::path(
    get,
    path = "/api/arrivals/{update_id}",
    params(
        ("update_id" = String, Path, description = "Trip update ID")
    ),
    responses(
        (status = 200, description = "Trip update found", body = TripUpdate),
        (status = 404, description = "Trip update not found", body = ErrorResponse)
    ),
    tag = "arrivals"
)]
pub async fn get_trip_update(
    State(state): State<AppState>,
    Path(update_id): Path<String>,
) -> Result<Json<TripUpdate>, ApiError> {
    state
        .store
        .get_trip_update(&update_id)
        .await
        .map(Json)
        .ok_or_else(|| not_found("Trip update"))
}

/// Record a single trip update; delay defaults to 0 and realtime to false
#[utoipa::path(
    post,
    path = "/api/arrivals",
    request_body = NewTripUpdate,
    responses(
        (status = 200, description = "Recorded trip update", body = TripUpdate),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    ),
    tag = "arrivals"
)]
pub async fn create_trip_update(
    State(state): State<AppState>,
    payload: Result<Json<NewTripUpdate>, JsonRejection>,
) -> Result<Json<TripUpdate>, ApiError> {
    let Json(input) = payload.map_err(rejected_body)?;
    let update = state
        .store
        .create_trip_update(input)
        .await
        .map_err(invalid_input)?;
    Ok(Json(update))
}

/// Replace the whole trip update set with a new feed snapshot
#[utoipa::path(
    put,
    path = "/api/arrivals",
    request_body = Vec<NewTripUpdate>,
    responses(
        (status = 200, description = "Number of trip updates installed", body = ReplaceResponse),
        (status = 400, description = "Invalid input; nothing was replaced", body = ErrorResponse)
    ),
    tag = "arrivals"
)]
pub async fn replace_trip_updates(
    State(state): State<AppState>,
    payload: Result<Json<Vec<NewTripUpdate>>, JsonRejection>,
) -> Result<Json<ReplaceResponse>, ApiError> {
    let Json(inputs) = payload.map_err(rejected_body)?;
    let count = inputs.len();
    state
        .store
        .replace_trip_updates(inputs)
        .await
        .map_err(invalid_input)?;
    Ok(Json(ReplaceResponse { count }))
}
