//! Entity lock model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use cowrite_core::types::{Id, Timestamp};

/// A row from the `entity_locks` table.
///
/// A lock is active iff `released_at` is null and `expires_at` is in the
/// future; rows are kept after release for audit.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EntityLock {
    pub id: Id,
    pub entity_type: String,
    pub entity_id: Id,
    pub field_path: String,
    pub user_id: Id,
    pub session_id: Option<Id>,
    pub lock_type: String,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
    pub released_at: Option<Timestamp>,
    pub auto_release_on_disconnect: bool,
    pub max_duration_secs: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert DTO for `entity_locks`.
#[derive(Debug, Clone)]
pub struct NewLock {
    pub entity_type: String,
    pub entity_id: Id,
    pub user_id: Id,
    pub field_path: String,
    pub lock_type: String,
    pub duration_secs: i64,
    pub session_id: Option<Id>,
}

/// DTO for acquiring a lock.
#[derive(Debug, Deserialize)]
pub struct AcquireLockRequest {
    pub entity_type: String,
    pub entity_id: Id,
    #[serde(default)]
    pub field_path: String,
    pub lock_type: Option<String>,
    pub duration_secs: Option<i64>,
    pub session_id: Option<Id>,
}

/// DTO for releasing or extending a lock.
#[derive(Debug, Deserialize)]
pub struct LockActionRequest {
    pub lock_id: Id,
}
