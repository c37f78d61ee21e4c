//! Collaboration session and participant models and DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use cowrite_core::types::{Id, Timestamp};

// ---------------------------------------------------------------------------
// CollaborationSession
// ---------------------------------------------------------------------------

/// A row from the `collaboration_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CollaborationSession {
    pub id: Id,
    pub entity_type: String,
    pub entity_id: Id,
    pub name: String,
    pub is_active: bool,
    pub allow_anonymous: bool,
    pub max_participants: i32,
    pub require_lock_for_edit: bool,
    pub created_by: Id,
    pub started_at: Timestamp,
    pub last_activity_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Options accepted when creating a session.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SessionOptions {
    pub name: Option<String>,
    #[serde(default)]
    pub allow_anonymous: bool,
    pub max_participants: Option<i32>,
    #[serde(default)]
    pub require_lock_for_edit: bool,
}

/// DTO for the get-or-create session endpoint.
#[derive(Debug, Deserialize)]
pub struct JoinSessionRequest {
    pub entity_type: String,
    pub entity_id: Id,
    #[serde(default)]
    pub options: SessionOptions,
}

// ---------------------------------------------------------------------------
// SessionParticipant
// ---------------------------------------------------------------------------

/// A row from the `session_participants` table.
///
/// Unique per (session, user). Soft-closed on disconnect — the row stays
/// while any change references it as author.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SessionParticipant {
    pub id: Id,
    pub session_id: Id,
    pub user_id: Id,
    pub status: String,
    pub role: String,
    pub cursor_position: Option<Value>,
    pub selection: Option<Value>,
    pub joined_at: Timestamp,
    pub last_seen_at: Timestamp,
    pub left_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
