pub mod alerts;
pub mod arrivals;
pub mod board;
pub mod error;
pub mod favorites;
pub mod nsw;
pub mod routes;
pub mod searches;
pub mod stops;
pub mod vehicles;

pub use error::{
    bad_request, internal_error, invalid_input, not_found, rejected_body, ApiError, ErrorResponse,
};

use axum::Router;
use chrono_tz::Tz;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::config::BoardConfig;
use crate::live::LiveCache;
use crate::store::MemStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemStore>,
    pub cache: LiveCache,
    /// Zone for clock-time ETA labels
    pub tz: Tz,
    pub board: BoardConfig,
    pub nsw_api_key: Option<String>,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Nightride API",
        description = "Live arrival boards for night bus services"
    ),
    tags(
        (name = "stops", description = "Stop lookup"),
        (name = "routes", description = "Route metadata"),
        (name = "vehicles", description = "Vehicle positions"),
        (name = "arrivals", description = "Trip updates per stop"),
        (name = "alerts", description = "Service alerts"),
        (name = "searches", description = "Recent searches"),
        (name = "favorites", description = "Favorite stops"),
        (name = "nsw", description = "Transport for NSW realtime feed"),
        (name = "board", description = "Live boards rendered from the dataset cache")
    )
)]
pub struct ApiDoc;

/// Builds the REST router and its OpenAPI document
pub fn app(state: AppState) -> (Router, utoipa::openapi::OpenApi) {
    OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(stops::router())
        .merge(routes::router())
        .merge(vehicles::router())
        .merge(arrivals::router())
        .merge(alerts::router())
        .merge(searches::router())
        .merge(favorites::router())
        .merge(nsw::router())
        .merge(board::router())
        .with_state(state)
        .split_for_parts()
}
