use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::{invalid_input, not_found, rejected_body, ApiError, AppState, ErrorResponse};
use crate::models::{FavoriteStop, NewFavoriteStop};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_favorites, add_favorite))
        .routes(routes!(favorite_status, remove_favorite))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserQuery {
    /// Owner of the favorites (default "default")
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RemovedResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FavoriteStatus {
    pub is_favorite: bool,
}

/// Favorite stops of a user
#[utoipa::path(
    get,
    path = "/api/favorites",
    params(UserQuery),
    responses(
        (status = 200, description = "Favorite stops", body = Vec<FavoriteStop>)
    ),
    tag = "favorites"
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Json<Vec<FavoriteStop>> {
    Json(state.store.favorite_stops(query.user_id.as_deref()).await)
}

/// Mark a stop as favorite; adding it twice returns the existing entry
#[utoipa::path(
    post,
    path = "/api/favorites",
    request_body = NewFavoriteStop,
    responses(
        (status = 200, description = "Favorite entry", body = FavoriteStop),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    ),
    tag = "favorites"
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    payload: Result<Json<NewFavoriteStop>, JsonRejection>,
) -> Result<Json<FavoriteStop>, ApiError> {
    let Json(input) = payload.map_err(rejected_body)?;
    let favorite = state
        .store
        .add_favorite_stop(input)
        .await
        .map_err(invalid_input)?;
    Ok(Json(favorite))
}

#[utoipa::path(
    delete,
    path = "/api/favorites/{stop_id}",
    params(
        ("stop_id" = String, Path, description = "Stop ID"),
        UserQuery
    ),
    responses(
        (status = 200, description = "Favorite removed", body = RemovedResponse),
        (status = 404, description = "Stop was not a favorite", body = ErrorResponse)
    ),
    tag = "favorites"
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Result<Json<RemovedResponse>, ApiError> {
    if state
        .store
        .remove_favorite_stop(&stop_id, query.user_id.as_deref())
        .await
    {
        Ok(Json(RemovedResponse { success: true }))
    } else {
        Err(not_found("Favorite"))
    }
}

#[utoipa::path(
    get,
    path = "/api/favorites/{stop_id}",
    params(
        ("stop_id" = String, Path, description = "Stop ID"),
        UserQuery
    ),
    responses(
        (status = 200, description = "Whether the stop is a favorite", body = FavoriteStatus)
    ),
    tag = "favorites"
)]
pub async fn favorite_status(
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Json<FavoriteStatus> {
    let is_favorite = state
        .store
        .is_favorite_stop(&stop_id, query.user_id.as_deref())
        .await;
    Json(FavoriteStatus { is_favorite })
}
