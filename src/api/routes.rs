use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::{invalid_input, not_found, rejected_body, ApiError, AppState, ErrorResponse};
use crate::models::{NewRoute, Route};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_routes, create_route))
        .routes(routes!(night_routes))
        .routes(routes!(get_route))
}

/// List all routes
#[utoipa::path(
    get,
    path = "/api/routes",
    responses(
        (status = 200, description = "All routes ordered by id", body = Vec<Route>)
    ),
    tag = "routes"
)]
pub async fn list_routes(State(state): State<AppState>) -> Json<Vec<Route>> {
    Json(state.store.list_routes().await)
}

/// Routes flagged as night services
#[utoipa::path(
    get,
    path = "/api/routes/night",
    responses(
        (status = 200, description = "Night routes", body = Vec<Route>)
    ),
    tag = "routes"
)]
pub async fn night_routes(State(state): State<AppState>) -> Json<Vec<Route>> {
    Json(state.store.night_routes().await)
}

/// Get a single route
#[utoipa::path(
    get,
    path = "/api/routes/{route_id}",
    params(
        ("route_id" = String, Path, description = "Route ID")
    ),
    responses(
        (status = 200, description = "Route found", body = Route),
        (status = 404, description = "Route not found", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
) -> Result<Json<Route>, ApiError> {
    state
        .store
        .get_route(&route_id)
        .await
        .map(Json)
        .ok_or_else(|| not_found("Route"))
}

/// Create a route; color defaults to #1565C0 and status to active
#[utoipa::path(
    post,
    path = "/api/routes",
    request_body = NewRoute,
    responses(
        (status = 200, description = "Created route", body = Route),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn create_route(
    State(state): State<AppState>,
    payload: Result<Json<NewRoute>, JsonRejection>,
) -> Result<Json<Route>, ApiError> {
    let Json(input) = payload.map_err(rejected_body)?;
    let route = state.store.create_route(input).await.map_err(invalid_input)?;
    Ok(Json(route))
}
