//! Repository for the `user_presence` table.

use sqlx::PgPool;

use cowrite_core::types::Id;

use crate::models::presence::Presence;

/// Column list for `user_presence` queries.
const PRESENCE_COLUMNS: &str = "id, user_id, status, status_message, current_page, \
                                 current_entity_type, current_entity_id, is_typing, \
                                 typing_field, connection_id, last_heartbeat, \
                                 created_at, updated_at";

/// Provides upsert and query operations for user presence.
pub struct PresenceRepo;

impl PresenceRepo {
    /// Mark a user online, recording the connection that brought them up.
    pub async fn set_online(
        pool: &PgPool,
        user_id: Id,
        connection_id: &str,
    ) -> Result<Presence, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_presence (user_id, status, connection_id) \
             VALUES ($1, 'online', $2) \
             ON CONFLICT (user_id) \
             DO UPDATE SET status = 'online', connection_id = $2, \
                           last_heartbeat = NOW(), updated_at = NOW() \
             RETURNING {PRESENCE_COLUMNS}"
        );
        sqlx::query_as::<_, Presence>(&query)
            .bind(user_id)
            .bind(connection_id)
            .fetch_one(pool)
            .await
    }

    /// Mark a user offline and clear their transient state.
    pub async fn set_offline(pool: &PgPool, user_id: Id) -> Result<Option<Presence>, sqlx::Error> {
        let query = format!(
            "UPDATE user_presence \
             SET status = 'offline', is_typing = FALSE, typing_field = NULL, \
                 connection_id = NULL, updated_at = NOW() \
             WHERE user_id = $1 \
             RETURNING {PRESENCE_COLUMNS}"
        );
        sqlx::query_as::<_, Presence>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Update status and status message.
    pub async fn update_status(
        pool: &PgPool,
        user_id: Id,
        status: &str,
        status_message: Option<&str>,
    ) -> Result<Option<Presence>, sqlx::Error> {
        let query = format!(
            "UPDATE user_presence \
             SET status = $2, status_message = $3, last_heartbeat = NOW(), updated_at = NOW() \
             WHERE user_id = $1 \
             RETURNING {PRESENCE_COLUMNS}"
        );
        sqlx::query_as::<_, Presence>(&query)
            .bind(user_id)
            .bind(status)
            .bind(status_message)
            .fetch_optional(pool)
            .await
    }

    /// Update the user's current page / entity.
    pub async fn update_location(
        pool: &PgPool,
        user_id: Id,
        page: Option<&str>,
        entity_type: Option<&str>,
        entity_id: Option<Id>,
    ) -> Result<Option<Presence>, sqlx::Error> {
        let query = format!(
            "UPDATE user_presence \
             SET current_page = $2, current_entity_type = $3, current_entity_id = $4, \
                 last_heartbeat = NOW(), updated_at = NOW() \
             WHERE user_id = $1 \
             RETURNING {PRESENCE_COLUMNS}"
        );
        sqlx::query_as::<_, Presence>(&query)
            .bind(user_id)
            .bind(page)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_optional(pool)
            .await
    }

    /// Set or clear the typing flag. `field` names where the user is typing.
    pub async fn set_typing(
        pool: &PgPool,
        user_id: Id,
        is_typing: bool,
        field: Option<&str>,
    ) -> Result<Option<Presence>, sqlx::Error> {
        let query = format!(
            "UPDATE user_presence \
             SET is_typing = $2, typing_field = $3, last_heartbeat = NOW(), updated_at = NOW() \
             WHERE user_id = $1 \
             RETURNING {PRESENCE_COLUMNS}"
        );
        sqlx::query_as::<_, Presence>(&query)
            .bind(user_id)
            .bind(is_typing)
            .bind(field)
            .fetch_optional(pool)
            .await
    }

    /// Refresh the heartbeat without touching anything else.
    pub async fn heartbeat(pool: &PgPool, user_id: Id) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_presence SET last_heartbeat = NOW(), updated_at = NOW() \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Everyone not offline, most recently seen first.
    pub async fn get_online(pool: &PgPool) -> Result<Vec<Presence>, sqlx::Error> {
        let query = format!(
            "SELECT {PRESENCE_COLUMNS} FROM user_presence \
             WHERE status <> 'offline' \
             ORDER BY last_heartbeat DESC"
        );
        sqlx::query_as::<_, Presence>(&query).fetch_all(pool).await
    }

    /// Everyone not offline currently on the given entity.
    pub async fn get_online_for_entity(
        pool: &PgPool,
        entity_type: &str,
        entity_id: Id,
    ) -> Result<Vec<Presence>, sqlx::Error> {
        let query = format!(
            "SELECT {PRESENCE_COLUMNS} FROM user_presence \
             WHERE status <> 'offline' \
               AND current_entity_type = $1 AND current_entity_id = $2 \
             ORDER BY last_heartbeat DESC"
        );
        sqlx::query_as::<_, Presence>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_all(pool)
            .await
    }

    /// Mark users offline whose heartbeat is older than `stale_secs`.
    /// Returns the number of rows swept.
    pub async fn cleanup_stale(pool: &PgPool, stale_secs: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_presence \
             SET status = 'offline', is_typing = FALSE, typing_field = NULL, \
                 connection_id = NULL, updated_at = NOW() \
             WHERE status <> 'offline' \
               AND last_heartbeat < NOW() - make_interval(secs => $1::double precision)",
        )
        .bind(stale_secs)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
