//! User presence model.

use serde::Serialize;
use sqlx::FromRow;

use cowrite_core::types::{Id, Timestamp};

/// A row from the `user_presence` table — one per user, globally scoped.
///
/// Best-effort telemetry: never authoritative for access control.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Presence {
    pub id: Id,
    pub user_id: Id,
    pub status: String,
    pub status_message: Option<String>,
    pub current_page: Option<String>,
    pub current_entity_type: Option<String>,
    pub current_entity_id: Option<Id>,
    pub is_typing: bool,
    pub typing_field: Option<String>,
    pub connection_id: Option<String>,
    pub last_heartbeat: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
