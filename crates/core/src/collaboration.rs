//! Real-time collaboration constants, channel naming, and validation.
//!
//! This module lives in `core` (zero internal deps) so that the repository
//! layer, the WebSocket consumer, and the background sweeps can all
//! reference the same lock durations, status vocabularies, and channel
//! naming scheme.

use crate::error::CoreError;
use crate::types::Id;

// ---------------------------------------------------------------------------
// Lock duration constants
// ---------------------------------------------------------------------------

/// Default lock duration in seconds (30 minutes).
pub const DEFAULT_LOCK_DURATION_SECS: i64 = 30 * 60;

/// Maximum allowed lock duration in seconds (4 hours).
pub const MAX_LOCK_DURATION_SECS: i64 = 4 * 60 * 60;

/// Minimum lock duration in seconds.
pub const MIN_LOCK_DURATION_SECS: i64 = 60;

/// How often the stale-lock cleanup sweep runs (in seconds).
pub const LOCK_CLEANUP_INTERVAL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Presence constants
// ---------------------------------------------------------------------------

/// Presence rows whose heartbeat is older than this are considered stale.
pub const PRESENCE_STALE_TIMEOUT_SECS: i64 = 120;

/// How often the stale-presence sweep runs (in seconds).
pub const PRESENCE_CLEANUP_INTERVAL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Session constants
// ---------------------------------------------------------------------------

/// Default participant cap for a new session.
pub const DEFAULT_MAX_PARTICIPANTS: i32 = 50;

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// The global presence channel every connection may subscribe to.
pub const PRESENCE_CHANNEL: &str = "presence:global";

/// Channel carrying events scoped to one collaboration session.
pub fn session_channel(session_id: Id) -> String {
    format!("session:{session_id}")
}

/// Channel carrying events scoped to one business entity.
pub fn entity_channel(entity_type: &str, entity_id: Id) -> String {
    format!("entity:{entity_type}:{entity_id}")
}

// ---------------------------------------------------------------------------
// Lock types
// ---------------------------------------------------------------------------

/// Known lock types.
pub mod lock_types {
    /// Only one holder; blocks every other lock on the same path.
    pub const EXCLUSIVE: &str = "exclusive";
    /// Coexists with other shared/intent locks, blocked by exclusive.
    pub const SHARED: &str = "shared";
    /// Declares intent to edit; same coexistence rules as shared.
    pub const INTENT: &str = "intent";
}

/// The set of all valid lock types.
pub const VALID_LOCK_TYPES: &[&str] = &[
    lock_types::EXCLUSIVE,
    lock_types::SHARED,
    lock_types::INTENT,
];

/// Returns `true` if the given lock type is valid.
pub fn is_valid_lock_type(lock_type: &str) -> bool {
    VALID_LOCK_TYPES.contains(&lock_type)
}

// ---------------------------------------------------------------------------
// Participant status / role
// ---------------------------------------------------------------------------

/// Known participant statuses.
pub mod participant_status {
    pub const ACTIVE: &str = "active";
    pub const IDLE: &str = "idle";
    pub const AWAY: &str = "away";
    pub const DISCONNECTED: &str = "disconnected";
}

/// The set of all valid participant statuses.
pub const VALID_PARTICIPANT_STATUSES: &[&str] = &[
    participant_status::ACTIVE,
    participant_status::IDLE,
    participant_status::AWAY,
    participant_status::DISCONNECTED,
];

/// Known participant roles.
pub mod participant_roles {
    pub const OWNER: &str = "owner";
    pub const EDITOR: &str = "editor";
    pub const COMMENTER: &str = "commenter";
    pub const VIEWER: &str = "viewer";
}

/// The set of all valid participant roles.
pub const VALID_PARTICIPANT_ROLES: &[&str] = &[
    participant_roles::OWNER,
    participant_roles::EDITOR,
    participant_roles::COMMENTER,
    participant_roles::VIEWER,
];

/// Returns `true` if the given role is valid.
pub fn is_valid_participant_role(role: &str) -> bool {
    VALID_PARTICIPANT_ROLES.contains(&role)
}

// ---------------------------------------------------------------------------
// Presence status
// ---------------------------------------------------------------------------

/// Known presence statuses.
pub mod presence_status {
    pub const ONLINE: &str = "online";
    pub const BUSY: &str = "busy";
    pub const AWAY: &str = "away";
    pub const DND: &str = "dnd";
    pub const OFFLINE: &str = "offline";
}

/// The set of all valid presence statuses.
pub const VALID_PRESENCE_STATUSES: &[&str] = &[
    presence_status::ONLINE,
    presence_status::BUSY,
    presence_status::AWAY,
    presence_status::DND,
    presence_status::OFFLINE,
];

/// Returns `true` if the given presence status is valid.
pub fn is_valid_presence_status(status: &str) -> bool {
    VALID_PRESENCE_STATUSES.contains(&status)
}

// ---------------------------------------------------------------------------
// Comment status
// ---------------------------------------------------------------------------

/// Known comment statuses.
pub mod comment_status {
    pub const OPEN: &str = "open";
    pub const RESOLVED: &str = "resolved";
    pub const WONT_FIX: &str = "wont_fix";
}

/// The set of all valid comment statuses.
pub const VALID_COMMENT_STATUSES: &[&str] = &[
    comment_status::OPEN,
    comment_status::RESOLVED,
    comment_status::WONT_FIX,
];

/// Returns `true` if the given comment status is valid.
pub fn is_valid_comment_status(status: &str) -> bool {
    VALID_COMMENT_STATUSES.contains(&status)
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate an entity type string.
///
/// Entity types are an open set (the business services own them), so this
/// only checks shape: non-empty, at most 64 chars, lowercase identifier
/// characters.
pub fn validate_entity_type(entity_type: &str) -> Result<(), CoreError> {
    if entity_type.is_empty() {
        return Err(CoreError::Validation("entity_type must not be empty".into()));
    }
    if entity_type.len() > 64 {
        return Err(CoreError::Validation(format!(
            "entity_type too long ({} chars, max 64)",
            entity_type.len()
        )));
    }
    if !entity_type
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(CoreError::Validation(format!(
            "entity_type '{entity_type}' must be a lowercase identifier"
        )));
    }
    Ok(())
}

/// Validate a dotted field path.
///
/// When `allow_empty` is true an empty path is accepted (a whole-entity
/// lock); change operations always require a concrete path.
pub fn validate_field_path(path: &str, allow_empty: bool) -> Result<(), CoreError> {
    if path.is_empty() {
        if allow_empty {
            return Ok(());
        }
        return Err(CoreError::Validation("field_path must not be empty".into()));
    }
    if path.len() > 256 {
        return Err(CoreError::Validation(format!(
            "field_path too long ({} chars, max 256)",
            path.len()
        )));
    }
    for segment in path.split('.') {
        if segment.is_empty() {
            return Err(CoreError::Validation(format!(
                "field_path '{path}' contains an empty segment"
            )));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(CoreError::Validation(format!(
                "field_path segment '{segment}' contains invalid characters"
            )));
        }
    }
    Ok(())
}

/// Validate a lock duration in seconds.
pub fn validate_lock_duration(secs: i64) -> Result<(), CoreError> {
    if secs < MIN_LOCK_DURATION_SECS {
        return Err(CoreError::Validation(format!(
            "Lock duration must be at least {MIN_LOCK_DURATION_SECS} second(s), got {secs}"
        )));
    }
    if secs > MAX_LOCK_DURATION_SECS {
        return Err(CoreError::Validation(format!(
            "Lock duration must be at most {MAX_LOCK_DURATION_SECS} seconds, got {secs}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_valid_lock_types() {
        assert!(is_valid_lock_type("exclusive"));
        assert!(is_valid_lock_type("shared"));
        assert!(is_valid_lock_type("intent"));
    }

    #[test]
    fn test_invalid_lock_types() {
        assert!(!is_valid_lock_type(""));
        assert!(!is_valid_lock_type("EXCLUSIVE"));
        assert!(!is_valid_lock_type("write"));
    }

    #[test]
    fn test_channel_names() {
        let id = Uuid::nil();
        assert_eq!(
            session_channel(id),
            "session:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            entity_channel("contact", id),
            "entity:contact:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(PRESENCE_CHANNEL, "presence:global");
    }

    #[test]
    fn test_valid_entity_types() {
        assert!(validate_entity_type("contact").is_ok());
        assert!(validate_entity_type("crm_record").is_ok());
        assert!(validate_entity_type("document2").is_ok());
    }

    #[test]
    fn test_invalid_entity_types() {
        assert!(validate_entity_type("").is_err());
        assert!(validate_entity_type("Contact").is_err());
        assert!(validate_entity_type("has space").is_err());
        assert!(validate_entity_type(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_field_path_validation() {
        assert!(validate_field_path("notes", false).is_ok());
        assert!(validate_field_path("address.street", false).is_ok());
        assert!(validate_field_path("items.0.name", false).is_ok());

        assert!(validate_field_path("", false).is_err());
        assert!(validate_field_path("", true).is_ok());
        assert!(validate_field_path(".leading", false).is_err());
        assert!(validate_field_path("trailing.", false).is_err());
        assert!(validate_field_path("a..b", false).is_err());
        assert!(validate_field_path("bad path", false).is_err());
    }

    #[test]
    fn test_lock_duration_bounds() {
        assert!(validate_lock_duration(DEFAULT_LOCK_DURATION_SECS).is_ok());
        assert!(validate_lock_duration(MIN_LOCK_DURATION_SECS).is_ok());
        assert!(validate_lock_duration(MAX_LOCK_DURATION_SECS).is_ok());
        assert!(validate_lock_duration(0).is_err());
        assert!(validate_lock_duration(MAX_LOCK_DURATION_SECS + 1).is_err());
    }

    #[test]
    fn test_status_vocabularies() {
        assert!(is_valid_presence_status("online"));
        assert!(is_valid_presence_status("dnd"));
        assert!(!is_valid_presence_status("invisible"));

        assert!(is_valid_participant_role("owner"));
        assert!(!is_valid_participant_role("admin"));

        assert!(is_valid_comment_status("wont_fix"));
        assert!(!is_valid_comment_status("closed"));
    }
}
