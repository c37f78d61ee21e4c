//! Lock registry: exclusive/shared/intent locks on entities and fields.
//!
//! Acquisition is non-blocking — contention comes back as
//! [`LockAttempt::Denied`] naming the holder, never as an error, because
//! the caller must branch on it (show "locked by X" in the UI).

use std::sync::Arc;

use serde_json::json;

use cowrite_core::collaboration::{
    entity_channel, is_valid_lock_type, lock_types, validate_entity_type, validate_field_path,
    validate_lock_duration, DEFAULT_LOCK_DURATION_SECS,
};
use cowrite_core::types::Id;
use cowrite_db::models::lock::{AcquireLockRequest, EntityLock, NewLock};
use cowrite_db::repositories::{EntityLockRepo, LockAttempt};
use cowrite_db::DbPool;
use cowrite_events::{CollabEvent, EventBus};

use crate::error::AppError;
use crate::ws::ConnectionHub;

use super::payload;

/// Manages entity and field locks.
#[derive(Clone)]
pub struct LockRegistry {
    pool: DbPool,
    bus: Arc<EventBus>,
    hub: Arc<ConnectionHub>,
}

impl LockRegistry {
    pub fn new(pool: DbPool, bus: Arc<EventBus>, hub: Arc<ConnectionHub>) -> Self {
        Self { pool, bus, hub }
    }

    /// Attempt to acquire a lock.
    ///
    /// On success, `lock:acquired` is broadcast on the entity channel. On
    /// denial, the requesting user alone is told via `lock:denied` — lock
    /// contention is personal, not channel news.
    pub async fn acquire(
        &self,
        user_id: Id,
        req: &AcquireLockRequest,
    ) -> Result<LockAttempt, AppError> {
        validate_entity_type(&req.entity_type)?;
        validate_field_path(&req.field_path, true)?;

        let lock_type = req.lock_type.as_deref().unwrap_or(lock_types::EXCLUSIVE);
        if !is_valid_lock_type(lock_type) {
            return Err(AppError::BadRequest(format!("Invalid lock_type '{lock_type}'")));
        }

        let duration_secs = req.duration_secs.unwrap_or(DEFAULT_LOCK_DURATION_SECS);
        validate_lock_duration(duration_secs)?;

        let attempt = EntityLockRepo::acquire(
            &self.pool,
            &NewLock {
                entity_type: req.entity_type.clone(),
                entity_id: req.entity_id,
                user_id,
                field_path: req.field_path.clone(),
                lock_type: lock_type.to_string(),
                duration_secs,
                session_id: req.session_id,
            },
        )
        .await?;

        match &attempt {
            LockAttempt::Acquired(lock) => {
                tracing::info!(
                    user_id = %user_id,
                    entity_type = %lock.entity_type,
                    entity_id = %lock.entity_id,
                    field_path = %lock.field_path,
                    lock_type = %lock.lock_type,
                    "Lock acquired"
                );
                self.bus.publish(
                    CollabEvent::new(
                        entity_channel(&lock.entity_type, lock.entity_id),
                        "lock:acquired",
                        payload(lock),
                    )
                    .with_sender(user_id),
                );
            }
            LockAttempt::Denied(holder) => {
                tracing::debug!(
                    user_id = %user_id,
                    holder_user_id = %holder.user_id,
                    entity_type = %req.entity_type,
                    entity_id = %req.entity_id,
                    "Lock denied"
                );
                self.hub
                    .send_to_user(
                        user_id,
                        "lock:denied",
                        json!({
                            "entity_type": req.entity_type,
                            "entity_id": req.entity_id,
                            "field_path": req.field_path,
                            "holder_user_id": holder.user_id,
                            "expires_at": holder.expires_at,
                        }),
                    )
                    .await;
            }
        }

        Ok(attempt)
    }

    /// Release a held lock. Only the holder can release.
    pub async fn release(&self, user_id: Id, lock_id: Id) -> Result<EntityLock, AppError> {
        let lock = EntityLockRepo::release(&self.pool, lock_id, user_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest("You do not hold an active lock with this id".into())
            })?;

        tracing::info!(user_id = %user_id, lock_id = %lock_id, "Lock released");
        self.publish_released(&lock);
        Ok(lock)
    }

    /// Extend a held lock's expiration, bounded by its maximum duration.
    pub async fn extend(
        &self,
        user_id: Id,
        lock_id: Id,
        duration_secs: Option<i64>,
    ) -> Result<EntityLock, AppError> {
        let duration_secs = duration_secs.unwrap_or(DEFAULT_LOCK_DURATION_SECS);
        validate_lock_duration(duration_secs)?;

        let lock = EntityLockRepo::extend(&self.pool, lock_id, user_id, duration_secs)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest("You do not hold an active lock with this id".into())
            })?;

        tracing::debug!(
            user_id = %user_id,
            lock_id = %lock_id,
            new_expires_at = %lock.expires_at,
            "Lock extended"
        );
        Ok(lock)
    }

    /// All currently-active locks on an entity.
    pub async fn get_locks(
        &self,
        entity_type: &str,
        entity_id: Id,
    ) -> Result<Vec<EntityLock>, AppError> {
        validate_entity_type(entity_type)?;
        Ok(EntityLockRepo::get_active(&self.pool, entity_type, entity_id).await?)
    }

    /// Release the user's auto-release locks when their last connection
    /// drops. Each released lock is announced on its entity channel.
    pub async fn release_on_disconnect(&self, user_id: Id) -> Result<usize, AppError> {
        let released = EntityLockRepo::release_auto_for_user(&self.pool, user_id).await?;
        for lock in &released {
            self.publish_released(lock);
        }
        if !released.is_empty() {
            tracing::info!(
                user_id = %user_id,
                count = released.len(),
                "Auto-released locks on disconnect"
            );
        }
        Ok(released.len())
    }

    fn publish_released(&self, lock: &EntityLock) {
        self.bus.publish(
            CollabEvent::new(
                entity_channel(&lock.entity_type, lock.entity_id),
                "lock:released",
                payload(lock),
            )
            .with_sender(lock.user_id),
        );
    }
}
