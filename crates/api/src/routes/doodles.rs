//! Doodle snapshot routes mounted at `/doodles`.

use axum::routing::get;
use axum::Router;

use crate::handlers::doodles;
use crate::state::AppState;

/// ```text
/// GET /latest   -> latest_doodles
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/latest", get(doodles::latest_doodles))
}
