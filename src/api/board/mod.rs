mod socket;

pub use socket::*;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::{internal_error, ApiError, AppState, ErrorResponse};
use crate::board::{self, Read, StopBoard, VehiclesPanel};
use crate::freshness::DatasetKey;

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(get_stop_board))
        .routes(routes!(retry_arrivals))
        .routes(routes!(stop_board_socket))
        .routes(routes!(foreground))
        .routes(routes!(live_vehicles))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BoardQuery {
    /// Maximum number of arrivals shown (default from config, at least 1)
    pub limit: Option<usize>,
}

impl BoardQuery {
    pub(crate) fn limit(&self, state: &AppState) -> usize {
        self.limit.unwrap_or(state.board.default_limit).max(1)
    }
}

/// Render the live board of a stop
#[utoipa::path(
    get,
    path = "/api/board/stops/{stop_id}",
    params(
        ("stop_id" = String, Path, description = "Stop ID"),
        BoardQuery
    ),
    responses(
        (status = 200, description = "Board with one section per panel", body = StopBoard)
    ),
    tag = "board"
)]
pub async fn get_stop_board(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
    Query(query): Query<BoardQuery>,
) -> Json<StopBoard> {
    let limit = query.limit(&state);
    Json(board::stop_board(&state.cache, &stop_id, limit, state.tz, Read::Refresh).await)
}

/// Refetch the arrivals of a stop after an error and re-render its board
#[utoipa::path(
    post,
    path = "/api/board/stops/{stop_id}/retry",
    params(
        ("stop_id" = String, Path, description = "Stop ID"),
        BoardQuery
    ),
    responses(
        (status = 200, description = "Board after the retry", body = StopBoard)
    ),
    tag = "board"
)]
pub async fn retry_arrivals(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
    Query(query): Query<BoardQuery>,
) -> Json<StopBoard> {
    let limit = query.limit(&state);
    state
        .cache
        .retry(&DatasetKey::ArrivalsForStop(stop_id.clone()))
        .await;
    Json(board::stop_board(&state.cache, &stop_id, limit, state.tz, Read::Refresh).await)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ForegroundResponse {
    /// Live datasets marked for refetch
    pub invalidated: usize,
}

/// Foreground event: force-refresh every live dataset
#[utoipa::path(
    post,
    path = "/api/board/foreground",
    responses(
        (status = 200, description = "Live datasets invalidated", body = ForegroundResponse)
    ),
    tag = "board"
)]
pub async fn foreground(State(state): State<AppState>) -> Json<ForegroundResponse> {
    Json(ForegroundResponse {
        invalidated: state.cache.on_foreground(),
    })
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct VehiclesQuery {
    /// Only vehicles serving this route
    pub route_id: Option<String>,
}

/// Live vehicle positions with their dataset state
#[utoipa::path(
    get,
    path = "/api/board/vehicles",
    params(VehiclesQuery),
    responses(
        (status = 200, description = "Vehicle panel", body = VehiclesPanel),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "board"
)]
pub async fn live_vehicles(
    State(state): State<AppState>,
    Query(query): Query<VehiclesQuery>,
) -> Result<Json<VehiclesPanel>, ApiError> {
    let panel = board::vehicles(&state.cache, query.route_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(panel))
}
