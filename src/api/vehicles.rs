use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::{invalid_input, not_found, rejected_body, ApiError, AppState, ErrorResponse};
use crate::models::{NewVehiclePosition, VehiclePosition};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            list_vehicle_positions,
            create_vehicle_position,
            replace_vehicle_positions
        ))
        .routes(routes!(vehicle_positions_for_route))
        .routes(routes!(get_vehicle_position))
}

/// Latest position of every vehicle
#[utoipa::path(
    get,
    path = "/api/vehicles",
    responses(
        (status = 200, description = "All vehicle positions", body = Vec<VehiclePosition>)
    ),
    tag = "vehicles"
)]
pub async fn list_vehicle_positions(State(state): State<AppState>) -> Json<Vec<VehiclePosition>> {
    Json(state.store.list_vehicle_positions().await)
}

/// Vehicles currently serving a route
#[utoipa::path(
    get,
    path = "/api/vehicles/route/{route_id}",
    params(
        ("route_id" = String, Path, description = "Route ID")
    ),
    responses(
        (status = 200, description = "Vehicle positions on the route", body = Vec<VehiclePosition>)
    ),
    tag = "vehicles"
)]
pub async fn vehicle_positions_for_route(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
) -> Json<Vec<VehiclePosition>> {
    Json(state.store.vehicle_positions_for_route(&route_id).await)
}

#[utoipa::path(
    get,
    path = "/api/vehicles/{position_id}",
    params(
        ("position_id" = String, Path, description = "Vehicle position ID")
    ),
    responses(
        (status = 200, description = "Vehicle position found", body = VehiclePosition),
        (status = 404, description = "Vehicle position not found", body = ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn get_vehicle_position(
    State(state): State<AppState>,
    Path(position_id): Path<String>,
) -> Result<Json<VehiclePosition>, ApiError> {
    state
        .store
        .get_vehicle_position(&position_id)
        .await
        .map(Json)
        .ok_or_else(|| not_found("Vehicle position"))
}

/// Record a single vehicle position
#[utoipa::path(
    post,
    path = "/api/vehicles",
    request_body = NewVehiclePosition,
    responses(
        (status = 200, description = "Recorded position", body = VehiclePosition),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn create_vehicle_position(
    State(state): State<AppState>,
    payload: Result<Json<NewVehiclePosition>, JsonRejection>,
) -> Result<Json<VehiclePosition>, ApiError> {
    let Json(input) = payload.map_err(rejected_body)?;
    let position = state
        .store
        .create_vehicle_position(input)
        .await
        .map_err(invalid_input)?;
    Ok(Json(position))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReplaceResponse {
    pub count: usize,
}

/// Replace the whole position set with a new feed snapshot
#[utoipa::path(
    put,
    path = "/api/vehicles",
    request_body = Vec<NewVehiclePosition>,
    responses(
        (status = 200, description = "Number of positions installed", body = ReplaceResponse),
        (status = 400, description = "Invalid input; nothing was replaced", body = ErrorResponse)
    ),
    tag = "vehicles"
)]
pub async fn replace_vehicle_positions(
    State(state): State<AppState>,
    payload: Result<Json<Vec<NewVehiclePosition>>, JsonRejection>,
) -> Result<Json<ReplaceResponse>, ApiError> {
    let Json(inputs) = payload.map_err(rejected_body)?;
    let count = inputs.len();
    state
        .store
        .replace_vehicle_positions(inputs)
        .await
        .map_err(invalid_input)?;
    Ok(Json(ReplaceResponse { count }))
}
