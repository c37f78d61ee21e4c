//! Handlers for locks, presence, versions, and change history.
//!
//! Lock endpoints allow acquiring, releasing, extending, and querying
//! locks. Presence endpoints report who is online on an entity. Version
//! and change endpoints expose the edit metadata this engine records.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use cowrite_core::error::CoreError;
use cowrite_core::types::Id;
use cowrite_db::models::lock::{AcquireLockRequest, LockActionRequest};
use cowrite_db::repositories::{ChangeRepo, ConflictRecordRepo, EntityVersionRepo, LockAttempt};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Lock Endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/collaboration/locks/acquire
///
/// Attempt to acquire a lock on an entity or field. Returns 409 naming the
/// holder if a conflicting lock is active.
pub async fn acquire_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<AcquireLockRequest>,
) -> AppResult<impl IntoResponse> {
    match state.locks.acquire(auth.user_id, &input).await? {
        LockAttempt::Acquired(lock) => Ok(Json(DataResponse { data: lock })),
        LockAttempt::Denied(holder) => Err(CoreError::Conflict(format!(
            "Entity is locked by user {} until {}",
            holder.user_id, holder.expires_at
        ))
        .into()),
    }
}

/// POST /api/v1/collaboration/locks/release
///
/// Release a held lock. Only the lock holder can release.
pub async fn release_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<LockActionRequest>,
) -> AppResult<impl IntoResponse> {
    let lock = state.locks.release(auth.user_id, input.lock_id).await?;
    Ok(Json(DataResponse { data: lock }))
}

/// Body for the lock extension endpoint.
#[derive(Debug, Deserialize)]
pub struct ExtendLockRequest {
    pub lock_id: Id,
    pub duration_secs: Option<i64>,
}

/// POST /api/v1/collaboration/locks/extend
///
/// Extend the expiration of a held lock. Only the lock holder can extend.
pub async fn extend_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ExtendLockRequest>,
) -> AppResult<impl IntoResponse> {
    let lock = state
        .locks
        .extend(auth.user_id, input.lock_id, input.duration_secs)
        .await?;
    Ok(Json(DataResponse { data: lock }))
}

/// GET /api/v1/collaboration/locks/{entity_type}/{entity_id}
///
/// All currently-active locks on an entity.
pub async fn get_locks(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, Id)>,
) -> AppResult<impl IntoResponse> {
    let locks = state.locks.get_locks(&entity_type, entity_id).await?;
    Ok(Json(DataResponse { data: locks }))
}

// ---------------------------------------------------------------------------
// Presence Endpoints
// ---------------------------------------------------------------------------

/// GET /api/v1/collaboration/presence
///
/// Everyone currently online.
pub async fn get_online_users(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let users = state.presence.get_online_users(None).await?;
    Ok(Json(DataResponse { data: users }))
}

/// GET /api/v1/collaboration/presence/{entity_type}/{entity_id}
///
/// The users currently viewing an entity.
pub async fn get_presence(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, Id)>,
) -> AppResult<impl IntoResponse> {
    let users = state
        .presence
        .get_online_users(Some((&entity_type, entity_id)))
        .await?;
    Ok(Json(DataResponse { data: users }))
}

// ---------------------------------------------------------------------------
// Version / Change Endpoints
// ---------------------------------------------------------------------------

/// GET /api/v1/collaboration/versions/{entity_type}/{entity_id}
///
/// The entity's full version history in order.
pub async fn get_versions(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, Id)>,
) -> AppResult<impl IntoResponse> {
    let versions = EntityVersionRepo::list(&state.pool, &entity_type, entity_id).await?;
    Ok(Json(DataResponse { data: versions }))
}

/// Query parameters for history endpoints.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// Default and maximum page size for history queries.
const DEFAULT_HISTORY_LIMIT: i64 = 100;
const MAX_HISTORY_LIMIT: i64 = 500;

/// GET /api/v1/collaboration/changes/{session_id}
///
/// Recent changes in a session, newest first.
pub async fn get_changes(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<Id>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let changes = ChangeRepo::list_for_session(&state.pool, session_id, limit).await?;
    Ok(Json(DataResponse { data: changes }))
}

/// GET /api/v1/collaboration/conflicts/{session_id}
///
/// Conflicts recorded in a session, newest first.
pub async fn get_conflicts(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<Id>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let conflicts = ConflictRecordRepo::list_for_session(&state.pool, session_id, limit).await?;
    Ok(Json(DataResponse { data: conflicts }))
}
