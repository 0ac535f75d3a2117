use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::{invalid_input, rejected_body, ApiError, AppState, ErrorResponse};
use crate::models::{NewRecentSearch, RecentSearch};

pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(recent_searches))
        .routes(routes!(create_search))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecentQuery {
    /// Maximum number of searches to return (default 10)
    pub limit: Option<usize>,
}

/// Most recent searches first
#[utoipa::path(
    get,
    path = "/api/searches/recent",
    params(RecentQuery),
    responses(
        (status = 200, description = "Recent searches, newest first", body = Vec<RecentSearch>)
    ),
    tag = "searches"
)]
pub async fn recent_searches(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<RecentSearch>> {
    Json(state.store.recent_searches(query.limit).await)
}

/// Record a search; only the newest 50 are kept
#[utoipa::path(
    post,
    path = "/api/searches",
    request_body = NewRecentSearch,
    responses(
        (status = 200, description = "Recorded search", body = RecentSearch),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    ),
    tag = "searches"
)]
pub async fn create_search(
    State(state): State<AppState>,
    payload: Result<Json<NewRecentSearch>, JsonRejection>,
) -> Result<Json<RecentSearch>, ApiError> {
    let Json(input) = payload.map_err(rejected_body)?;
    let search = state
        .store
        .create_recent_search(input)
        .await
        .map_err(invalid_input)?;
    Ok(Json(search))
}
