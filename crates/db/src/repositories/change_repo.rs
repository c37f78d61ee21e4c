//! Repositories for `collaboration_changes`, `entity_versions`, and
//! `conflict_records`.
//!
//! The write paths here run inside the change coordinator's per-entity
//! transaction (see [`crate::lock_entity_for_write`]), so they take
//! `&mut PgConnection` rather than a pool.

use sqlx::{PgConnection, PgPool};

use cowrite_core::types::Id;

use crate::models::change::{
    CollaborationChange, ConflictRecord, EntityVersion, NewChange, NewConflictRecord,
};

// ---------------------------------------------------------------------------
// ChangeRepo
// ---------------------------------------------------------------------------

/// Column list for `collaboration_changes` queries.
const CHANGE_COLUMNS: &str = "id, session_id, participant_id, user_id, change_type, \
                               field_path, old_value, new_value, position, length, \
                               base_version, result_version, is_conflicted, \
                               conflict_resolution, created_at, applied_at";

/// Provides operations for the append-only change log.
pub struct ChangeRepo;

impl ChangeRepo {
    /// Append a change row. `applied_at` is stamped at insert time.
    pub async fn insert(
        conn: &mut PgConnection,
        input: &NewChange,
    ) -> Result<CollaborationChange, sqlx::Error> {
        let query = format!(
            "INSERT INTO collaboration_changes \
                 (session_id, participant_id, user_id, change_type, field_path, \
                  old_value, new_value, position, length, base_version, \
                  result_version, is_conflicted, conflict_resolution, applied_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW()) \
             RETURNING {CHANGE_COLUMNS}"
        );
        sqlx::query_as::<_, CollaborationChange>(&query)
            .bind(input.session_id)
            .bind(input.participant_id)
            .bind(input.user_id)
            .bind(&input.change_type)
            .bind(&input.field_path)
            .bind(&input.old_value)
            .bind(&input.new_value)
            .bind(input.position)
            .bind(input.length)
            .bind(input.base_version)
            .bind(input.result_version)
            .bind(input.is_conflicted)
            .bind(&input.conflict_resolution)
            .fetch_one(conn)
            .await
    }

    /// Applied changes on the same field that an author working from
    /// `assumed_version` had not seen (their base at or after it), authored
    /// by a different user — the concurrent candidates for conflict
    /// detection.
    pub async fn find_concurrent(
        conn: &mut PgConnection,
        session_id: Id,
        field_path: &str,
        assumed_version: i64,
        exclude_user_id: Id,
    ) -> Result<Vec<CollaborationChange>, sqlx::Error> {
        let query = format!(
            "SELECT {CHANGE_COLUMNS} FROM collaboration_changes \
             WHERE session_id = $1 AND field_path = $2 AND base_version >= $3 \
               AND user_id <> $4 AND applied_at IS NOT NULL \
             ORDER BY applied_at"
        );
        sqlx::query_as::<_, CollaborationChange>(&query)
            .bind(session_id)
            .bind(field_path)
            .bind(assumed_version)
            .bind(exclude_user_id)
            .fetch_all(conn)
            .await
    }

    /// Recent changes in a session, newest first.
    pub async fn list_for_session(
        pool: &PgPool,
        session_id: Id,
        limit: i64,
    ) -> Result<Vec<CollaborationChange>, sqlx::Error> {
        let query = format!(
            "SELECT {CHANGE_COLUMNS} FROM collaboration_changes \
             WHERE session_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, CollaborationChange>(&query)
            .bind(session_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}

// ---------------------------------------------------------------------------
// EntityVersionRepo
// ---------------------------------------------------------------------------

/// Column list for `entity_versions` queries.
const VERSION_COLUMNS: &str =
    "id, entity_type, entity_id, version, snapshot, change_ids, created_at";

/// Provides operations for the append-only version store.
pub struct EntityVersionRepo;

impl EntityVersionRepo {
    /// The latest version row for an entity. `None` reads as version 0.
    pub async fn latest(
        conn: &mut PgConnection,
        entity_type: &str,
        entity_id: Id,
    ) -> Result<Option<EntityVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {VERSION_COLUMNS} FROM entity_versions \
             WHERE entity_type = $1 AND entity_id = $2 \
             ORDER BY version DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, EntityVersion>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_optional(conn)
            .await
    }

    /// Append a version row.
    ///
    /// The unique constraint on (entity_type, entity_id, version) is the
    /// backstop for the gapless-sequence invariant; under the per-entity
    /// advisory lock it never fires.
    pub async fn insert(
        conn: &mut PgConnection,
        entity_type: &str,
        entity_id: Id,
        version: i64,
        snapshot: &serde_json::Value,
        change_ids: &[Id],
    ) -> Result<EntityVersion, sqlx::Error> {
        let query = format!(
            "INSERT INTO entity_versions (entity_type, entity_id, version, snapshot, change_ids) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {VERSION_COLUMNS}"
        );
        sqlx::query_as::<_, EntityVersion>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .bind(version)
            .bind(snapshot)
            .bind(change_ids)
            .fetch_one(conn)
            .await
    }

    /// All versions of an entity in order.
    pub async fn list(
        pool: &PgPool,
        entity_type: &str,
        entity_id: Id,
    ) -> Result<Vec<EntityVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {VERSION_COLUMNS} FROM entity_versions \
             WHERE entity_type = $1 AND entity_id = $2 \
             ORDER BY version"
        );
        sqlx::query_as::<_, EntityVersion>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_all(pool)
            .await
    }
}

// ---------------------------------------------------------------------------
// ConflictRecordRepo
// ---------------------------------------------------------------------------

/// Column list for `conflict_records` queries.
const CONFLICT_COLUMNS: &str = "id, local_change_id, remote_change_id, conflict_type, \
                                 field_path, resolution_strategy, resolved_value, \
                                 resolved_by, resolved_at";

/// Provides operations for conflict records.
pub struct ConflictRecordRepo;

impl ConflictRecordRepo {
    /// Record a resolved collision between two changes.
    pub async fn insert(
        conn: &mut PgConnection,
        input: &NewConflictRecord,
    ) -> Result<ConflictRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO conflict_records \
                 (local_change_id, remote_change_id, conflict_type, field_path, \
                  resolution_strategy, resolved_value, resolved_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {CONFLICT_COLUMNS}"
        );
        sqlx::query_as::<_, ConflictRecord>(&query)
            .bind(input.local_change_id)
            .bind(input.remote_change_id)
            .bind(&input.conflict_type)
            .bind(&input.field_path)
            .bind(&input.resolution_strategy)
            .bind(&input.resolved_value)
            .bind(input.resolved_by)
            .fetch_one(conn)
            .await
    }

    /// Conflicts recorded against changes of a session, newest first.
    pub async fn list_for_session(
        pool: &PgPool,
        session_id: Id,
        limit: i64,
    ) -> Result<Vec<ConflictRecord>, sqlx::Error> {
        sqlx::query_as::<_, ConflictRecord>(
            "SELECT cr.id, cr.local_change_id, cr.remote_change_id, cr.conflict_type, \
                    cr.field_path, cr.resolution_strategy, cr.resolved_value, \
                    cr.resolved_by, cr.resolved_at \
             FROM conflict_records cr \
             JOIN collaboration_changes cc ON cc.id = cr.local_change_id \
             WHERE cc.session_id = $1 \
             ORDER BY cr.resolved_at DESC \
             LIMIT $2",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
