//! Change, entity-version, and conflict-record models and DTOs.

use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

use cowrite_core::types::{Id, Timestamp};

// ---------------------------------------------------------------------------
// CollaborationChange
// ---------------------------------------------------------------------------

/// A row from the `collaboration_changes` table. Immutable once created;
/// conflict fields are set at creation time, never mutated later.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CollaborationChange {
    pub id: Id,
    pub session_id: Id,
    /// Non-owning reference to the authoring participant row.
    pub participant_id: Id,
    pub user_id: Id,
    pub change_type: String,
    pub field_path: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub position: Option<i64>,
    pub length: Option<i64>,
    pub base_version: i64,
    pub result_version: i64,
    pub is_conflicted: bool,
    pub conflict_resolution: Option<String>,
    pub created_at: Timestamp,
    pub applied_at: Option<Timestamp>,
}

/// Insert DTO for `collaboration_changes`.
#[derive(Debug, Clone)]
pub struct NewChange {
    pub session_id: Id,
    pub participant_id: Id,
    pub user_id: Id,
    pub change_type: String,
    pub field_path: String,
    pub old_value: Value,
    pub new_value: Value,
    pub position: Option<i64>,
    pub length: Option<i64>,
    pub base_version: i64,
    pub result_version: i64,
    pub is_conflicted: bool,
    pub conflict_resolution: Option<String>,
}

// ---------------------------------------------------------------------------
// EntityVersion
// ---------------------------------------------------------------------------

/// A row from the append-only `entity_versions` table.
///
/// For a given entity the `version` values form a gapless increasing
/// sequence; "no row" reads as version 0.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EntityVersion {
    pub id: Id,
    pub entity_type: String,
    pub entity_id: Id,
    pub version: i64,
    pub snapshot: Value,
    pub change_ids: Vec<Id>,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// ConflictRecord
// ---------------------------------------------------------------------------

/// A row from the `conflict_records` table linking two collided changes.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConflictRecord {
    pub id: Id,
    pub local_change_id: Id,
    pub remote_change_id: Id,
    pub conflict_type: String,
    pub field_path: String,
    pub resolution_strategy: String,
    pub resolved_value: Option<Value>,
    pub resolved_by: Id,
    pub resolved_at: Timestamp,
}

/// Insert DTO for `conflict_records`.
#[derive(Debug, Clone)]
pub struct NewConflictRecord {
    pub local_change_id: Id,
    pub remote_change_id: Id,
    pub conflict_type: String,
    pub field_path: String,
    pub resolution_strategy: String,
    pub resolved_value: Value,
    pub resolved_by: Id,
}
