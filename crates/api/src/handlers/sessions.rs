//! Handlers for collaboration session lifecycle.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use cowrite_core::types::Id;
use cowrite_db::models::session::{CollaborationSession, JoinSessionRequest};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response for the get-or-create endpoint.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: CollaborationSession,
    pub was_created: bool,
}

/// POST /api/v1/sessions
///
/// Get the entity's active session, creating one (and joining it as owner)
/// if none exists.
pub async fn get_or_create_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<JoinSessionRequest>,
) -> AppResult<impl IntoResponse> {
    let (session, was_created) = state
        .sessions
        .get_or_create(&input.entity_type, input.entity_id, auth.user_id, &input.options)
        .await?;
    Ok(Json(DataResponse {
        data: SessionResponse {
            session,
            was_created,
        },
    }))
}

/// GET /api/v1/sessions/{id}
///
/// Fetch a session by id.
pub async fn get_session(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.get(session_id).await?;
    Ok(Json(DataResponse { data: session }))
}

/// POST /api/v1/sessions/{id}/leave
///
/// Leave a session (soft-closes the caller's participant row).
pub async fn leave_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    state.sessions.leave(session_id, auth.user_id).await?;
    Ok(Json(DataResponse {
        data: serde_json::json!({ "left": true }),
    }))
}

/// POST /api/v1/sessions/{id}/end
///
/// End a session. Invoked by the owner or the external idle-reaper.
pub async fn end_session(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    let session = state.sessions.end(session_id).await?;
    Ok(Json(DataResponse { data: session }))
}

/// GET /api/v1/sessions/{id}/participants
///
/// The participant roster of a session.
pub async fn get_participants(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    let participants = state.sessions.participants(session_id).await?;
    Ok(Json(DataResponse { data: participants }))
}
