//! Repository for the `comments` table.

use sqlx::PgPool;

use cowrite_core::types::Id;

use crate::models::comment::{Comment, CreateCommentRequest};

/// Column list for `comments` queries.
const COMMENT_COLUMNS: &str = "id, entity_type, entity_id, field_path, range_start, \
                                range_end, body, status, author_id, parent_id, \
                                thread_root_id, created_at, updated_at";

/// Provides CRUD operations for threaded comments.
pub struct CommentRepo;

impl CommentRepo {
    /// Create a comment. Replies inherit the parent's thread root (or use
    /// the parent itself when the parent starts the thread).
    pub async fn create(
        pool: &PgPool,
        author_id: Id,
        input: &CreateCommentRequest,
    ) -> Result<Comment, sqlx::Error> {
        let thread_root_id = match input.parent_id {
            Some(parent_id) => match Self::get(pool, parent_id).await? {
                Some(parent) => Some(parent.thread_root_id.unwrap_or(parent.id)),
                // Parent already gone: the reference is non-owning, keep the
                // reply as its own thread root.
                None => None,
            },
            None => None,
        };

        let query = format!(
            "INSERT INTO comments \
                 (entity_type, entity_id, field_path, range_start, range_end, \
                  body, author_id, parent_id, thread_root_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(&input.entity_type)
            .bind(input.entity_id)
            .bind(&input.field_path)
            .bind(input.range_start)
            .bind(input.range_end)
            .bind(&input.body)
            .bind(author_id)
            .bind(input.parent_id)
            .bind(thread_root_id)
            .fetch_one(pool)
            .await
    }

    /// Fetch a comment by id.
    pub async fn get(pool: &PgPool, id: Id) -> Result<Option<Comment>, sqlx::Error> {
        let query = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Update body and/or status. Unset fields keep their current value.
    pub async fn update(
        pool: &PgPool,
        id: Id,
        body: Option<&str>,
        status: Option<&str>,
    ) -> Result<Option<Comment>, sqlx::Error> {
        let query = format!(
            "UPDATE comments \
             SET body = COALESCE($2, body), status = COALESCE($3, status), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .bind(body)
            .bind(status)
            .fetch_optional(pool)
            .await
    }

    /// All comments on an entity, oldest first (thread order).
    pub async fn list_for_entity(
        pool: &PgPool,
        entity_type: &str,
        entity_id: Id,
    ) -> Result<Vec<Comment>, sqlx::Error> {
        let query = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments \
             WHERE entity_type = $1 AND entity_id = $2 \
             ORDER BY created_at"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_all(pool)
            .await
    }

    /// A full thread: the root and every comment referencing it.
    pub async fn list_thread(pool: &PgPool, root_id: Id) -> Result<Vec<Comment>, sqlx::Error> {
        let query = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments \
             WHERE id = $1 OR thread_root_id = $1 \
             ORDER BY created_at"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(root_id)
            .fetch_all(pool)
            .await
    }
}
