pub mod collaboration;
pub mod comments;
pub mod health;
pub mod sessions;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                              WebSocket
///
/// /collaboration/locks/acquire                     acquire lock (POST)
/// /collaboration/locks/release                     release lock (POST)
/// /collaboration/locks/extend                      extend lock (POST)
/// /collaboration/locks/{entity_type}/{entity_id}   active locks (GET)
/// /collaboration/presence                          online users (GET)
/// /collaboration/presence/{entity_type}/{entity_id} entity presence (GET)
/// /collaboration/versions/{entity_type}/{entity_id} version history (GET)
/// /collaboration/changes/{session_id}              change history (GET)
/// /collaboration/conflicts/{session_id}            conflict history (GET)
///
/// /sessions                                        get-or-create (POST)
/// /sessions/{id}                                   get (GET)
/// /sessions/{id}/leave                             leave (POST)
/// /sessions/{id}/end                               end (POST)
/// /sessions/{id}/participants                      roster (GET)
///
/// /comments                                        create (POST)
/// /comments/{id}                                   update (PATCH)
/// /comments/{id}/resolve                           resolve (POST)
/// /comments/entity/{entity_type}/{entity_id}       list (GET)
/// /comments/thread/{id}                            thread (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/collaboration", collaboration::router())
        .nest("/sessions", sessions::router())
        .nest("/comments", comments::router())
}
