use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use std::time::Duration;
use tracing::{debug, error, info};

use super::BoardQuery;
use crate::api::AppState;
use crate::board::{self, stop_board_keys, Read};

/// Client message signalling that the board became visible again
const FOREGROUND_MESSAGE: &str = "visible";

/// Live board of a stop over a WebSocket.
///
/// The socket observes the stop's arrivals, routes and alerts while it is open. A
/// board is pushed on every dataset change and re-rendered on a fixed interval so ETA
/// labels follow the clock. Sending `visible` triggers a foreground refresh.
#[utoipa::path(
    get,
    path = "/api/board/stops/{stop_id}/ws",
    params(
        ("stop_id" = String, Path, description = "Stop ID"),
        BoardQuery
    ),
    responses(
        (status = 101, description = "Switching to the live board socket")
    ),
    tag = "board"
)]
pub async fn stop_board_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(stop_id): Path<String>,
    Query(query): Query<BoardQuery>,
) -> Response {
    let limit = query.limit(&state);
    ws.on_upgrade(move |socket| serve_board(socket, state, stop_id, limit))
}

async fn serve_board(mut socket: WebSocket, state: AppState, stop_id: String, limit: usize) {
    let [mut arrivals, mut routes, mut alerts] =
        stop_board_keys(&stop_id).map(|key| state.cache.observe(key));
    let mut render = tokio::time::interval(Duration::from_secs(
        state.board.render_interval_secs.max(1),
    ));
    info!(stop_id = %stop_id, "Board socket opened");

    loop {
        let push = tokio::select! {
            _ = render.tick() => true,
            _ = arrivals.changed() => true,
            _ = routes.changed() => true,
            _ = alerts.changed() => true,
            message = socket.recv() => match message {
                Some(Ok(Message::Text(text))) if text.as_str().trim() == FOREGROUND_MESSAGE => {
                    state.cache.on_foreground();
                    false
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => false,
                Some(Err(e)) => {
                    debug!(stop_id = %stop_id, error = %e, "Board socket receive failed");
                    break;
                }
            },
        };
        if !push {
            continue;
        }

        let rendered =
            board::stop_board(&state.cache, &stop_id, limit, state.tz, Read::Cached).await;
        let payload = match serde_json::to_string(&rendered) {
            Ok(payload) => payload,
            Err(e) => {
                error!(stop_id = %stop_id, error = %e, "Failed to serialize board");
                break;
            }
        };
        if socket.send(Message::Text(payload.into())).await.is_err() {
            break;
        }
    }

    // Dropping the subscriptions stops their pollers
    drop((arrivals, routes, alerts));
    info!(stop_id = %stop_id, "Board socket closed");
}
