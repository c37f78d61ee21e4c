//! Route definitions for comment threads.

use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::comments;
use crate::state::AppState;

/// Comment routes mounted at `/comments`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(comments::create_comment))
        .route("/{id}", patch(comments::update_comment))
        .route("/{id}/resolve", post(comments::resolve_comment))
        .route(
            "/entity/{entity_type}/{entity_id}",
            get(comments::list_comments),
        )
        .route("/thread/{id}", get(comments::get_thread))
}
