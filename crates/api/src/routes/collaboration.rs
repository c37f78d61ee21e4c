//! Route definitions for locks, presence, versions, and change history.
//!
//! All endpoints require authentication via the `AuthUser` extractor.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::collaboration;
use crate::state::AppState;

/// Collaboration routes mounted at `/collaboration`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/locks/acquire", post(collaboration::acquire_lock))
        .route("/locks/release", post(collaboration::release_lock))
        .route("/locks/extend", post(collaboration::extend_lock))
        .route(
            "/locks/{entity_type}/{entity_id}",
            get(collaboration::get_locks),
        )
        .route("/presence", get(collaboration::get_online_users))
        .route(
            "/presence/{entity_type}/{entity_id}",
            get(collaboration::get_presence),
        )
        .route(
            "/versions/{entity_type}/{entity_id}",
            get(collaboration::get_versions),
        )
        .route("/changes/{session_id}", get(collaboration::get_changes))
        .route("/conflicts/{session_id}", get(collaboration::get_conflicts))
}
