use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::{invalid_input, not_found, rejected_body, ApiError, AppState, ErrorResponse};
use crate::models::{NewServiceAlert, ServiceAlert, ServiceAlertUpdate};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_alerts, create_alert))
        .routes(routes!(alerts_for_route))
        .routes(routes!(get_alert, update_alert))
}

/// Active service alerts
#[utoipa::path(
    get,
    path = "/api/alerts",
    responses(
        (status = 200, description = "Active alerts, oldest first", body = Vec<ServiceAlert>)
    ),
    tag = "alerts"
)]
pub async fn list_alerts(State(state): State<AppState>) -> Json<Vec<ServiceAlert>> {
    Json(state.store.active_service_alerts().await)
}

/// Active alerts affecting a route
#[utoipa::path(
    get,
    path = "/api/alerts/route/{route_id}",
    params(
        ("route_id" = String, Path, description = "Route ID")
    ),
    responses(
        (status = 200, description = "Active alerts naming the route", body = Vec<ServiceAlert>)
    ),
    tag = "alerts"
)]
pub async fn alerts_for_route(
    State(state): State<AppState>,
    Path(route_id): Path<String>,
) -> Json<Vec<ServiceAlert>> {
    Json(state.store.alerts_for_route(&route_id).await)
}

#[utoipa::path(
    get,
    path = "/api/alerts/{alert_id}",
    params(
        ("alert_id" = String, Path, description = "Alert ID")
    ),
    responses(
        (status = 200, description = "Alert found", body = ServiceAlert),
        (status = 404, description = "Alert not found", body = ErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn get_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
) -> Result<Json<ServiceAlert>, ApiError> {
    state
        .store
        .get_service_alert(&alert_id)
        .await
        .map(Json)
        .ok_or_else(|| not_found("Alert"))
}

/// Publish an alert; it is active unless stated otherwise
#[utoipa::path(
    post,
    path = "/api/alerts",
    request_body = NewServiceAlert,
    responses(
        (status = 200, description = "Created alert", body = ServiceAlert),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn create_alert(
    State(state): State<AppState>,
    payload: Result<Json<NewServiceAlert>, JsonRejection>,
) -> Result<Json<ServiceAlert>, ApiError> {
    let Json(input) = payload.map_err(rejected_body)?;
    let alert = state
        .store
        .create_service_alert(input)
        .await
        .map_err(invalid_input)?;
    Ok(Json(alert))
}

/// Partially update an alert, e.g. to deactivate it
#[utoipa::path(
    patch,
    path = "/api/alerts/{alert_id}",
    params(
        ("alert_id" = String, Path, description = "Alert ID")
    ),
    request_body = ServiceAlertUpdate,
    responses(
        (status = 200, description = "Updated alert", body = ServiceAlert),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Alert not found", body = ErrorResponse)
    ),
    tag = "alerts"
)]
pub async fn update_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
    payload: Result<Json<ServiceAlertUpdate>, JsonRejection>,
) -> Result<Json<ServiceAlert>, ApiError> {
    let Json(update) = payload.map_err(rejected_body)?;
    state
        .store
        .update_service_alert(&alert_id, update)
        .await
        .map_err(invalid_input)?
        .map(Json)
        .ok_or_else(|| not_found("Alert"))
}
