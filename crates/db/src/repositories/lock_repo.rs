//! Repository for the `entity_locks` table.

use sqlx::{PgConnection, PgPool};

use cowrite_core::collaboration::{lock_types, MAX_LOCK_DURATION_SECS};
use cowrite_core::types::Id;

use crate::models::lock::{EntityLock, NewLock};

/// Column list for `entity_locks` queries.
const LOCK_COLUMNS: &str = "id, entity_type, entity_id, field_path, user_id, session_id, \
                             lock_type, acquired_at, expires_at, released_at, \
                             auto_release_on_disconnect, max_duration_secs, \
                             created_at, updated_at";

/// Outcome of a lock acquisition attempt.
///
/// Contention is an expected, frequent outcome the caller must branch on,
/// so the denial carries the blocking lock instead of surfacing an error.
#[derive(Debug, Clone)]
pub enum LockAttempt {
    Acquired(EntityLock),
    /// The blocking lock, naming the current holder.
    Denied(EntityLock),
}

/// Provides acquisition, release, and cleanup for entity locks.
pub struct EntityLockRepo;

impl EntityLockRepo {
    /// Attempt to acquire a lock.
    ///
    /// Runs check-then-insert in a transaction serialized by the per-entity
    /// advisory lock, so two racing acquisitions cannot both pass the check.
    /// Non-blocking: contention returns [`LockAttempt::Denied`] immediately.
    ///
    /// Blocking rules: an exclusive request is blocked by any active lock
    /// covering the path; a shared/intent request is blocked only by an
    /// active exclusive lock. A request with `field_path = ''` (whole
    /// entity) considers every active lock on the entity, and a '' lock
    /// blocks every path.
    pub async fn acquire(pool: &PgPool, input: &NewLock) -> Result<LockAttempt, sqlx::Error> {
        let mut tx = pool.begin().await?;
        crate::lock_entity_for_write(&mut *tx, &input.entity_type, input.entity_id).await?;

        if let Some(blocking) = Self::find_blocking(
            &mut *tx,
            &input.entity_type,
            input.entity_id,
            &input.field_path,
            &input.lock_type,
        )
        .await?
        {
            tx.rollback().await?;
            return Ok(LockAttempt::Denied(blocking));
        }

        let query = format!(
            "INSERT INTO entity_locks \
                 (entity_type, entity_id, field_path, user_id, session_id, lock_type, \
                  expires_at, max_duration_secs) \
             VALUES ($1, $2, $3, $4, $5, $6, \
                     NOW() + make_interval(secs => $7::double precision), $8) \
             RETURNING {LOCK_COLUMNS}"
        );
        let lock = sqlx::query_as::<_, EntityLock>(&query)
            .bind(&input.entity_type)
            .bind(input.entity_id)
            .bind(&input.field_path)
            .bind(input.user_id)
            .bind(input.session_id)
            .bind(&input.lock_type)
            .bind(input.duration_secs)
            .bind(MAX_LOCK_DURATION_SECS)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(LockAttempt::Acquired(lock))
    }

    /// The oldest active lock that blocks the requested acquisition, if any.
    async fn find_blocking(
        conn: &mut PgConnection,
        entity_type: &str,
        entity_id: Id,
        field_path: &str,
        lock_type: &str,
    ) -> Result<Option<EntityLock>, sqlx::Error> {
        let exclusive_requested = lock_type == lock_types::EXCLUSIVE;
        let query = format!(
            "SELECT {LOCK_COLUMNS} FROM entity_locks \
             WHERE entity_type = $1 AND entity_id = $2 \
               AND released_at IS NULL AND expires_at > NOW() \
               AND ($3 = '' OR field_path = '' OR field_path = $3) \
               AND ($4 OR lock_type = 'exclusive') \
             ORDER BY acquired_at \
             LIMIT 1"
        );
        sqlx::query_as::<_, EntityLock>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .bind(field_path)
            .bind(exclusive_requested)
            .fetch_optional(conn)
            .await
    }

    /// Release a lock. Only the holder can release; returns the released
    /// row, or `None` if the caller does not hold it (or it was already
    /// released).
    pub async fn release(
        pool: &PgPool,
        lock_id: Id,
        user_id: Id,
    ) -> Result<Option<EntityLock>, sqlx::Error> {
        let query = format!(
            "UPDATE entity_locks \
             SET released_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND released_at IS NULL \
             RETURNING {LOCK_COLUMNS}"
        );
        sqlx::query_as::<_, EntityLock>(&query)
            .bind(lock_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Extend an active lock's expiration, bounded by its maximum duration.
    /// Only the holder can extend.
    pub async fn extend(
        pool: &PgPool,
        lock_id: Id,
        user_id: Id,
        duration_secs: i64,
    ) -> Result<Option<EntityLock>, sqlx::Error> {
        let query = format!(
            "UPDATE entity_locks \
             SET expires_at = LEAST( \
                     NOW() + make_interval(secs => $3::double precision), \
                     acquired_at + make_interval(secs => max_duration_secs::double precision)), \
                 updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND released_at IS NULL AND expires_at > NOW() \
             RETURNING {LOCK_COLUMNS}"
        );
        sqlx::query_as::<_, EntityLock>(&query)
            .bind(lock_id)
            .bind(user_id)
            .bind(duration_secs)
            .fetch_optional(pool)
            .await
    }

    /// All currently-active locks on an entity.
    pub async fn get_active(
        pool: &PgPool,
        entity_type: &str,
        entity_id: Id,
    ) -> Result<Vec<EntityLock>, sqlx::Error> {
        let query = format!(
            "SELECT {LOCK_COLUMNS} FROM entity_locks \
             WHERE entity_type = $1 AND entity_id = $2 \
               AND released_at IS NULL AND expires_at > NOW() \
             ORDER BY acquired_at"
        );
        sqlx::query_as::<_, EntityLock>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_all(pool)
            .await
    }

    /// Release every expired-but-unreleased lock. Returns the number of
    /// locks swept. Maintenance only — no per-lock broadcast.
    pub async fn cleanup_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE entity_locks \
             SET released_at = NOW(), updated_at = NOW() \
             WHERE released_at IS NULL AND expires_at <= NOW()",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Release the user's auto-release locks on disconnect. Returns the
    /// released rows so the caller can broadcast `lock:released` for each.
    pub async fn release_auto_for_user(
        pool: &PgPool,
        user_id: Id,
    ) -> Result<Vec<EntityLock>, sqlx::Error> {
        let query = format!(
            "UPDATE entity_locks \
             SET released_at = NOW(), updated_at = NOW() \
             WHERE user_id = $1 AND released_at IS NULL AND auto_release_on_disconnect \
             RETURNING {LOCK_COLUMNS}"
        );
        sqlx::query_as::<_, EntityLock>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
