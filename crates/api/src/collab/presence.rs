//! Presence tracking: who is online, where, doing what.
//!
//! Presence is best-effort telemetry — eventually consistent, never
//! authoritative for access control. Every mutation broadcasts so peers
//! converge on the next event.

use std::sync::Arc;

use serde_json::json;

use cowrite_core::collaboration::{
    entity_channel, is_valid_presence_status, validate_entity_type, PRESENCE_CHANNEL,
};
use cowrite_core::error::CoreError;
use cowrite_core::types::Id;
use cowrite_db::models::presence::Presence;
use cowrite_db::repositories::PresenceRepo;
use cowrite_db::DbPool;
use cowrite_events::{CollabEvent, EventBus};

use crate::error::AppError;

use super::payload;

/// Single source of truth for user presence.
#[derive(Clone)]
pub struct PresenceTracker {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl PresenceTracker {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// Mark a user online and announce it on the global presence channel.
    ///
    /// Broadcast includes the sender: the acting user's other tabs need the
    /// local confirmation too.
    pub async fn set_online(
        &self,
        user_id: Id,
        connection_id: &str,
    ) -> Result<Presence, AppError> {
        let presence = PresenceRepo::set_online(&self.pool, user_id, connection_id).await?;
        self.bus.publish(
            CollabEvent::new(PRESENCE_CHANNEL, "presence:joined", payload(&presence))
                .with_sender(user_id)
                .include_sender(),
        );
        tracing::debug!(user_id = %user_id, connection_id, "User online");
        Ok(presence)
    }

    /// Mark a user offline and announce it on the global presence channel.
    pub async fn set_offline(&self, user_id: Id) -> Result<(), AppError> {
        if PresenceRepo::set_offline(&self.pool, user_id).await?.is_some() {
            self.bus.publish(
                CollabEvent::new(
                    PRESENCE_CHANNEL,
                    "presence:left",
                    json!({ "user_id": user_id }),
                )
                .with_sender(user_id),
            );
            tracing::debug!(user_id = %user_id, "User offline");
        }
        Ok(())
    }

    /// Update status and status message.
    pub async fn update_status(
        &self,
        user_id: Id,
        status: &str,
        status_message: Option<&str>,
    ) -> Result<Presence, AppError> {
        if !is_valid_presence_status(status) {
            return Err(CoreError::Validation(format!("Invalid presence status '{status}'")).into());
        }
        let presence = PresenceRepo::update_status(&self.pool, user_id, status, status_message)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "presence",
                id: user_id,
            })?;

        self.bus.publish(
            CollabEvent::new(Self::scope(&presence), "presence:update", payload(&presence))
                .with_sender(user_id),
        );
        Ok(presence)
    }

    /// Update the user's current page / entity location.
    pub async fn update_location(
        &self,
        user_id: Id,
        page: Option<&str>,
        entity_type: Option<&str>,
        entity_id: Option<Id>,
    ) -> Result<Presence, AppError> {
        if let Some(et) = entity_type {
            validate_entity_type(et)?;
        }
        let presence =
            PresenceRepo::update_location(&self.pool, user_id, page, entity_type, entity_id)
                .await?
                .ok_or(CoreError::NotFound {
                    entity: "presence",
                    id: user_id,
                })?;

        self.bus.publish(
            CollabEvent::new(Self::scope(&presence), "presence:update", payload(&presence))
                .with_sender(user_id),
        );
        Ok(presence)
    }

    /// The user started typing in a field of their current entity.
    ///
    /// Typing events always carry the field name so the UI can show
    /// "X is typing in <field>". Without a current entity there is no
    /// channel to scope the event to, so only the row is updated.
    pub async fn start_typing(&self, user_id: Id, field: &str) -> Result<(), AppError> {
        let presence = PresenceRepo::set_typing(&self.pool, user_id, true, Some(field))
            .await?
            .ok_or(CoreError::NotFound {
                entity: "presence",
                id: user_id,
            })?;

        if let (Some(et), Some(eid)) = (&presence.current_entity_type, presence.current_entity_id)
        {
            self.bus.publish(
                CollabEvent::new(
                    entity_channel(et, eid),
                    "presence:typing_start",
                    json!({ "user_id": user_id, "field": field }),
                )
                .with_sender(user_id),
            );
        }
        Ok(())
    }

    /// The user stopped typing.
    pub async fn stop_typing(&self, user_id: Id) -> Result<(), AppError> {
        let presence = PresenceRepo::set_typing(&self.pool, user_id, false, None)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "presence",
                id: user_id,
            })?;

        if let (Some(et), Some(eid)) = (&presence.current_entity_type, presence.current_entity_id)
        {
            self.bus.publish(
                CollabEvent::new(
                    entity_channel(et, eid),
                    "presence:typing_stop",
                    json!({ "user_id": user_id }),
                )
                .with_sender(user_id),
            );
        }
        Ok(())
    }

    /// Refresh the user's heartbeat.
    pub async fn heartbeat(&self, user_id: Id) -> Result<(), AppError> {
        PresenceRepo::heartbeat(&self.pool, user_id).await?;
        Ok(())
    }

    /// Snapshot of online users, optionally filtered to one entity.
    pub async fn get_online_users(
        &self,
        entity: Option<(&str, Id)>,
    ) -> Result<Vec<Presence>, AppError> {
        let users = match entity {
            Some((entity_type, entity_id)) => {
                PresenceRepo::get_online_for_entity(&self.pool, entity_type, entity_id).await?
            }
            None => PresenceRepo::get_online(&self.pool).await?,
        };
        Ok(users)
    }

    /// The channel a presence update belongs on: the entity channel when
    /// the user is on an entity, else the global presence channel.
    fn scope(presence: &Presence) -> String {
        match (&presence.current_entity_type, presence.current_entity_id) {
            (Some(et), Some(eid)) => entity_channel(et, eid),
            _ => PRESENCE_CHANNEL.to_string(),
        }
    }
}
