//! Handlers for comment threads.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use cowrite_core::types::Id;
use cowrite_db::models::comment::{CreateCommentRequest, UpdateCommentRequest};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/comments
///
/// Create a comment, or a reply when `parent_id` is set.
pub async fn create_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateCommentRequest>,
) -> AppResult<impl IntoResponse> {
    let comment = state.comments.create(auth.user_id, &input).await?;
    Ok(Json(DataResponse { data: comment }))
}

/// PATCH /api/v1/comments/{id}
///
/// Update a comment's body or status.
pub async fn update_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<Id>,
    Json(input): Json<UpdateCommentRequest>,
) -> AppResult<impl IntoResponse> {
    let comment = state
        .comments
        .update(auth.user_id, comment_id, &input)
        .await?;
    Ok(Json(DataResponse { data: comment }))
}

/// POST /api/v1/comments/{id}/resolve
///
/// Mark a comment resolved.
pub async fn resolve_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    let comment = state.comments.resolve(auth.user_id, comment_id).await?;
    Ok(Json(DataResponse { data: comment }))
}

/// GET /api/v1/comments/entity/{entity_type}/{entity_id}
///
/// All comments on an entity in thread order.
pub async fn list_comments(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, Id)>,
) -> AppResult<impl IntoResponse> {
    let comments = state.comments.list_for_entity(&entity_type, entity_id).await?;
    Ok(Json(DataResponse { data: comments }))
}

/// GET /api/v1/comments/thread/{id}
///
/// A full thread by its root comment id.
pub async fn get_thread(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(root_id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    let thread = state.comments.thread(root_id).await?;
    Ok(Json(DataResponse { data: thread }))
}
