//! Repositories for `collaboration_sessions` and `session_participants`.

use serde_json::Value;
use sqlx::PgPool;

use cowrite_core::collaboration::DEFAULT_MAX_PARTICIPANTS;
use cowrite_core::types::Id;

use crate::models::session::{CollaborationSession, SessionOptions, SessionParticipant};

// ---------------------------------------------------------------------------
// SessionRepo
// ---------------------------------------------------------------------------

/// Column list for `collaboration_sessions` queries.
const SESSION_COLUMNS: &str = "id, entity_type, entity_id, name, is_active, \
                                allow_anonymous, max_participants, require_lock_for_edit, \
                                created_by, started_at, last_activity_at, ended_at, \
                                created_at, updated_at";

/// Provides CRUD operations for collaboration sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Get the active session for an entity if one exists, else create it.
    ///
    /// Uses `INSERT ... ON CONFLICT DO NOTHING` against the partial unique
    /// index on active sessions, so two racing callers converge on the same
    /// row. Returns the session and whether this call created it.
    pub async fn get_or_create(
        pool: &PgPool,
        entity_type: &str,
        entity_id: Id,
        user_id: Id,
        options: &SessionOptions,
    ) -> Result<(CollaborationSession, bool), sqlx::Error> {
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| format!("{entity_type} session"));
        let query = format!(
            "INSERT INTO collaboration_sessions \
                 (entity_type, entity_id, name, allow_anonymous, max_participants, \
                  require_lock_for_edit, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (entity_type, entity_id) WHERE is_active \
             DO NOTHING \
             RETURNING {SESSION_COLUMNS}"
        );
        let created = sqlx::query_as::<_, CollaborationSession>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .bind(&name)
            .bind(options.allow_anonymous)
            .bind(options.max_participants.unwrap_or(DEFAULT_MAX_PARTICIPANTS))
            .bind(options.require_lock_for_edit)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        match created {
            Some(session) => Ok((session, true)),
            None => {
                // Lost the race (or the session already existed) -- fetch it.
                let existing = Self::get_active_for_entity(pool, entity_type, entity_id)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                Ok((existing, false))
            }
        }
    }

    /// Fetch a session by id.
    pub async fn get(pool: &PgPool, id: Id) -> Result<Option<CollaborationSession>, sqlx::Error> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM collaboration_sessions WHERE id = $1");
        sqlx::query_as::<_, CollaborationSession>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch the active session for an entity, or `None`.
    pub async fn get_active_for_entity(
        pool: &PgPool,
        entity_type: &str,
        entity_id: Id,
    ) -> Result<Option<CollaborationSession>, sqlx::Error> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM collaboration_sessions \
             WHERE entity_type = $1 AND entity_id = $2 AND is_active"
        );
        sqlx::query_as::<_, CollaborationSession>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_optional(pool)
            .await
    }

    /// End a session. Returns the ended row, or `None` if it was not active.
    pub async fn end(pool: &PgPool, id: Id) -> Result<Option<CollaborationSession>, sqlx::Error> {
        let query = format!(
            "UPDATE collaboration_sessions \
             SET is_active = FALSE, ended_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND is_active \
             RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, CollaborationSession>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Refresh `last_activity_at`. Used by the external idle-reaper to
    /// decide when a session has gone quiet.
    pub async fn touch(pool: &PgPool, id: Id) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE collaboration_sessions \
             SET last_activity_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND is_active",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// ParticipantRepo
// ---------------------------------------------------------------------------

/// Column list for `session_participants` queries.
const PARTICIPANT_COLUMNS: &str = "id, session_id, user_id, status, role, \
                                    cursor_position, selection, joined_at, \
                                    last_seen_at, left_at, created_at, updated_at";

/// Provides CRUD operations for session participants.
pub struct ParticipantRepo;

impl ParticipantRepo {
    /// Join a session: insert the participant or re-activate an earlier row.
    ///
    /// Re-entry resets `left_at` and the status; the role is only set on
    /// first join (re-joining does not demote an owner to the default role).
    pub async fn upsert_join(
        pool: &PgPool,
        session_id: Id,
        user_id: Id,
        role: &str,
    ) -> Result<SessionParticipant, sqlx::Error> {
        let query = format!(
            "INSERT INTO session_participants (session_id, user_id, role) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (session_id, user_id) \
             DO UPDATE SET status = 'active', left_at = NULL, \
                           last_seen_at = NOW(), updated_at = NOW() \
             RETURNING {PARTICIPANT_COLUMNS}"
        );
        sqlx::query_as::<_, SessionParticipant>(&query)
            .bind(session_id)
            .bind(user_id)
            .bind(role)
            .fetch_one(pool)
            .await
    }

    /// Fetch the participant row for (session, user).
    pub async fn get(
        pool: &PgPool,
        session_id: Id,
        user_id: Id,
    ) -> Result<Option<SessionParticipant>, sqlx::Error> {
        let query = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM session_participants \
             WHERE session_id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, SessionParticipant>(&query)
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Soft-close a participant on leave/disconnect.
    pub async fn leave(
        pool: &PgPool,
        session_id: Id,
        user_id: Id,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE session_participants \
             SET status = 'disconnected', left_at = NOW(), updated_at = NOW() \
             WHERE session_id = $1 AND user_id = $2 AND left_at IS NULL",
        )
        .bind(session_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persist the participant's latest cursor position.
    pub async fn update_cursor(
        pool: &PgPool,
        session_id: Id,
        user_id: Id,
        cursor: &Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE session_participants \
             SET cursor_position = $3, last_seen_at = NOW(), updated_at = NOW() \
             WHERE session_id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(cursor)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persist the participant's latest text selection.
    pub async fn update_selection(
        pool: &PgPool,
        session_id: Id,
        user_id: Id,
        selection: &Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE session_participants \
             SET selection = $3, last_seen_at = NOW(), updated_at = NOW() \
             WHERE session_id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(selection)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All participants of a session, current ones first.
    pub async fn list_for_session(
        pool: &PgPool,
        session_id: Id,
    ) -> Result<Vec<SessionParticipant>, sqlx::Error> {
        let query = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM session_participants \
             WHERE session_id = $1 \
             ORDER BY (left_at IS NULL) DESC, joined_at"
        );
        sqlx::query_as::<_, SessionParticipant>(&query)
            .bind(session_id)
            .fetch_all(pool)
            .await
    }
}
