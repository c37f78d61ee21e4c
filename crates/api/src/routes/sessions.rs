//! Route definitions for session lifecycle.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Session routes mounted at `/sessions`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(sessions::get_or_create_session))
        .route("/{id}", get(sessions::get_session))
        .route("/{id}/leave", post(sessions::leave_session))
        .route("/{id}/end", post(sessions::end_session))
        .route("/{id}/participants", get(sessions::get_participants))
}
