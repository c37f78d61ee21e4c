//! Comment model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use cowrite_core::types::{Id, Timestamp};

/// A row from the `comments` table.
///
/// `parent_id` and `thread_root_id` are non-owning references: the rows
/// they point at may be gone and the comment still stands.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: Id,
    pub entity_type: String,
    pub entity_id: Id,
    pub field_path: Option<String>,
    pub range_start: Option<i64>,
    pub range_end: Option<i64>,
    pub body: String,
    pub status: String,
    pub author_id: Id,
    pub parent_id: Option<Id>,
    pub thread_root_id: Option<Id>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a comment (or a reply, when `parent_id` is set).
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub entity_type: String,
    pub entity_id: Id,
    pub field_path: Option<String>,
    pub range_start: Option<i64>,
    pub range_end: Option<i64>,
    pub body: String,
    pub parent_id: Option<Id>,
}

/// DTO for updating a comment's body or status.
#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub body: Option<String>,
    pub status: Option<String>,
}
