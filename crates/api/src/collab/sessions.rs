//! Collaboration session lifecycle and participant roster.
//!
//! Session state machine: none → active → ended. There is no paused state;
//! idle sessions are ended by the external idle-reaper calling
//! [`SessionManager::end`].

use std::sync::Arc;

use serde_json::{json, Value};

use cowrite_core::collaboration::{
    entity_channel, is_valid_participant_role, participant_roles, session_channel,
    validate_entity_type,
};
use cowrite_core::error::CoreError;
use cowrite_core::types::Id;
use cowrite_db::models::session::{CollaborationSession, SessionOptions, SessionParticipant};
use cowrite_db::repositories::{ParticipantRepo, SessionRepo};
use cowrite_db::DbPool;
use cowrite_events::{CollabEvent, EventBus};

use crate::error::AppError;

use super::payload;

/// Manages collaboration sessions and their participants.
#[derive(Clone)]
pub struct SessionManager {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl SessionManager {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// Return the entity's active session, creating one if none exists.
    ///
    /// Creation also seeds the first participant with the owner role and
    /// announces `session:started` on the entity channel. Returns the
    /// session and whether this call created it.
    pub async fn get_or_create(
        &self,
        entity_type: &str,
        entity_id: Id,
        user_id: Id,
        options: &SessionOptions,
    ) -> Result<(CollaborationSession, bool), AppError> {
        validate_entity_type(entity_type)?;

        let (session, was_created) =
            SessionRepo::get_or_create(&self.pool, entity_type, entity_id, user_id, options)
                .await?;

        if was_created {
            ParticipantRepo::upsert_join(
                &self.pool,
                session.id,
                user_id,
                participant_roles::OWNER,
            )
            .await?;

            self.bus.publish(
                CollabEvent::new(
                    entity_channel(entity_type, entity_id),
                    "session:started",
                    payload(&session),
                )
                .with_sender(user_id),
            );
            tracing::info!(
                session_id = %session.id,
                entity_type,
                entity_id = %entity_id,
                "Session started"
            );
        }

        Ok((session, was_created))
    }

    /// Create a session, failing if the entity already has an active one.
    pub async fn create(
        &self,
        entity_type: &str,
        entity_id: Id,
        user_id: Id,
        options: &SessionOptions,
    ) -> Result<CollaborationSession, AppError> {
        let (session, was_created) = self
            .get_or_create(entity_type, entity_id, user_id, options)
            .await?;
        if !was_created {
            return Err(CoreError::Conflict(format!(
                "Entity {entity_type}/{entity_id} already has an active session"
            ))
            .into());
        }
        Ok(session)
    }

    /// Join a session, or re-enter it after a disconnect.
    ///
    /// Idempotent: re-joining resets the participant's `left_at` and
    /// status. Joining an ended session fails NotFound — the caller should
    /// go through [`get_or_create`](Self::get_or_create) instead.
    pub async fn join(
        &self,
        session_id: Id,
        user_id: Id,
        role: Option<&str>,
    ) -> Result<(CollaborationSession, SessionParticipant), AppError> {
        let role = role.unwrap_or(participant_roles::EDITOR);
        if !is_valid_participant_role(role) {
            return Err(CoreError::Validation(format!("Invalid participant role '{role}'")).into());
        }

        let session = self.get_active(session_id).await?;
        let participant =
            ParticipantRepo::upsert_join(&self.pool, session_id, user_id, role).await?;
        SessionRepo::touch(&self.pool, session_id).await?;

        self.bus.publish(
            CollabEvent::new(
                session_channel(session_id),
                "session:participant_joined",
                payload(&participant),
            )
            .with_sender(user_id),
        );

        Ok((session, participant))
    }

    /// Leave a session: soft-close the participant row and announce it.
    pub async fn leave(&self, session_id: Id, user_id: Id) -> Result<(), AppError> {
        let left = ParticipantRepo::leave(&self.pool, session_id, user_id).await?;
        if !left {
            return Err(CoreError::NotFound {
                entity: "participant",
                id: user_id,
            }
            .into());
        }

        self.bus.publish(
            CollabEvent::new(
                session_channel(session_id),
                "session:participant_left",
                json!({ "session_id": session_id, "user_id": user_id }),
            )
            .with_sender(user_id),
        );
        Ok(())
    }

    /// End a session. Invoked by the owner or the external idle-reaper.
    pub async fn end(&self, session_id: Id) -> Result<CollaborationSession, AppError> {
        let session = SessionRepo::end(&self.pool, session_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "session",
                id: session_id,
            })?;

        self.bus.publish(CollabEvent::new(
            session_channel(session_id),
            "session:ended",
            payload(&session),
        ));
        tracing::info!(session_id = %session_id, "Session ended");
        Ok(session)
    }

    /// Persist a participant's cursor and broadcast the move to the rest
    /// of the session.
    pub async fn update_cursor(
        &self,
        session_id: Id,
        user_id: Id,
        cursor: Value,
    ) -> Result<(), AppError> {
        let updated =
            ParticipantRepo::update_cursor(&self.pool, session_id, user_id, &cursor).await?;
        if !updated {
            return Err(CoreError::NotFound {
                entity: "participant",
                id: user_id,
            }
            .into());
        }

        self.bus.publish(
            CollabEvent::new(
                session_channel(session_id),
                "session:cursor_moved",
                json!({ "session_id": session_id, "user_id": user_id, "cursor": cursor }),
            )
            .with_sender(user_id),
        );
        Ok(())
    }

    /// Persist a participant's selection and broadcast the change.
    pub async fn update_selection(
        &self,
        session_id: Id,
        user_id: Id,
        selection: Value,
    ) -> Result<(), AppError> {
        let updated =
            ParticipantRepo::update_selection(&self.pool, session_id, user_id, &selection).await?;
        if !updated {
            return Err(CoreError::NotFound {
                entity: "participant",
                id: user_id,
            }
            .into());
        }

        self.bus.publish(
            CollabEvent::new(
                session_channel(session_id),
                "session:selection_changed",
                json!({ "session_id": session_id, "user_id": user_id, "selection": selection }),
            )
            .with_sender(user_id),
        );
        Ok(())
    }

    /// The participant roster of a session.
    pub async fn participants(&self, session_id: Id) -> Result<Vec<SessionParticipant>, AppError> {
        // Verify the session exists so an unknown id is a 404, not [].
        self.get(session_id).await?;
        Ok(ParticipantRepo::list_for_session(&self.pool, session_id).await?)
    }

    /// Fetch a session or fail NotFound.
    pub async fn get(&self, session_id: Id) -> Result<CollaborationSession, AppError> {
        SessionRepo::get(&self.pool, session_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "session",
                    id: session_id,
                }
                .into()
            })
    }

    /// Fetch a session that must still be active.
    pub async fn get_active(&self, session_id: Id) -> Result<CollaborationSession, AppError> {
        let session = self.get(session_id).await?;
        if !session.is_active {
            return Err(CoreError::NotFound {
                entity: "session",
                id: session_id,
            }
            .into());
        }
        Ok(session)
    }
}
