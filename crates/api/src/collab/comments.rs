//! Threaded comments on entities, fields, and text ranges.

use std::sync::Arc;

use cowrite_core::collaboration::{
    comment_status, entity_channel, is_valid_comment_status, validate_entity_type,
    validate_field_path,
};
use cowrite_core::error::CoreError;
use cowrite_core::types::Id;
use cowrite_db::models::comment::{Comment, CreateCommentRequest, UpdateCommentRequest};
use cowrite_db::repositories::CommentRepo;
use cowrite_db::DbPool;
use cowrite_events::{CollabEvent, EventBus};

use crate::error::AppError;

use super::payload;

/// Manages comment threads and their lifecycle events.
#[derive(Clone)]
pub struct CommentService {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl CommentService {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// Create a comment or a reply and announce it on the entity channel.
    pub async fn create(
        &self,
        author_id: Id,
        req: &CreateCommentRequest,
    ) -> Result<Comment, AppError> {
        validate_entity_type(&req.entity_type)?;
        if let Some(path) = &req.field_path {
            validate_field_path(path, false)?;
        }
        if req.body.trim().is_empty() {
            return Err(CoreError::Validation("Comment body must not be empty".into()).into());
        }

        let comment = CommentRepo::create(&self.pool, author_id, req).await?;
        self.bus.publish(
            CollabEvent::new(
                entity_channel(&comment.entity_type, comment.entity_id),
                "comment:added",
                payload(&comment),
            )
            .with_sender(author_id),
        );
        Ok(comment)
    }

    /// Update a comment's body or status.
    pub async fn update(
        &self,
        user_id: Id,
        comment_id: Id,
        req: &UpdateCommentRequest,
    ) -> Result<Comment, AppError> {
        if let Some(status) = &req.status {
            if !is_valid_comment_status(status) {
                return Err(
                    CoreError::Validation(format!("Invalid comment status '{status}'")).into(),
                );
            }
        }

        let comment =
            CommentRepo::update(&self.pool, comment_id, req.body.as_deref(), req.status.as_deref())
                .await?
                .ok_or(CoreError::NotFound {
                    entity: "comment",
                    id: comment_id,
                })?;

        self.bus.publish(
            CollabEvent::new(
                entity_channel(&comment.entity_type, comment.entity_id),
                "comment:updated",
                payload(&comment),
            )
            .with_sender(user_id),
        );
        Ok(comment)
    }

    /// Mark a comment resolved and announce it.
    pub async fn resolve(&self, user_id: Id, comment_id: Id) -> Result<Comment, AppError> {
        let comment =
            CommentRepo::update(&self.pool, comment_id, None, Some(comment_status::RESOLVED))
                .await?
                .ok_or(CoreError::NotFound {
                    entity: "comment",
                    id: comment_id,
                })?;

        self.bus.publish(
            CollabEvent::new(
                entity_channel(&comment.entity_type, comment.entity_id),
                "comment:resolved",
                payload(&comment),
            )
            .with_sender(user_id),
        );
        Ok(comment)
    }

    /// All comments on an entity in thread order.
    pub async fn list_for_entity(
        &self,
        entity_type: &str,
        entity_id: Id,
    ) -> Result<Vec<Comment>, AppError> {
        validate_entity_type(entity_type)?;
        Ok(CommentRepo::list_for_entity(&self.pool, entity_type, entity_id).await?)
    }

    /// A full thread by its root comment id.
    pub async fn thread(&self, root_id: Id) -> Result<Vec<Comment>, AppError> {
        let comments = CommentRepo::list_thread(&self.pool, root_id).await?;
        if comments.is_empty() {
            return Err(CoreError::NotFound {
                entity: "comment",
                id: root_id,
            }
            .into());
        }
        Ok(comments)
    }
}
