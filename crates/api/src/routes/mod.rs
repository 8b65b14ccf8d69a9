pub mod doodles;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                    WebSocket (submit_doodle in; new_doodle, save_* out)
/// /doodles/latest        newest-first snapshot
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/doodles", doodles::router())
}

/// Root-level routes kept for existing drawing and display pages.
///
/// ```text
/// /ws                    WebSocket
/// /get_latest_doodles    newest-first snapshot
/// /get_server_info       bound host and port
/// ```
pub fn legacy_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/get_latest_doodles", get(handlers::doodles::latest_doodles))
        .route("/get_server_info", get(handlers::doodles::server_info))
}
