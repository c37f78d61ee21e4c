//! Change, conflict, and resolution vocabularies.
//!
//! These enums are shared between the conflict resolver, the change
//! coordinator, and the repository layer (which stores them as text).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// ChangeType
// ---------------------------------------------------------------------------

/// The kind of edit a collaboration change represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Insert,
    Delete,
    Replace,
    Move,
    Format,
}

impl ChangeType {
    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Replace => "replace",
            Self::Move => "move",
            Self::Format => "format",
        }
    }

    /// Parse from the database/wire representation.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "insert" => Ok(Self::Insert),
            "delete" => Ok(Self::Delete),
            "replace" => Ok(Self::Replace),
            "move" => Ok(Self::Move),
            "format" => Ok(Self::Format),
            other => Err(CoreError::Validation(format!(
                "Invalid change_type '{other}'"
            ))),
        }
    }

    /// Text-range operations carry a `[position, position + length)`
    /// interval; move/format do not.
    pub fn is_text_range(&self) -> bool {
        matches!(self, Self::Insert | Self::Delete | Self::Replace)
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ConflictType
// ---------------------------------------------------------------------------

/// How two concurrent changes collided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    ConcurrentEdit,
    DeleteUpdate,
    MoveEdit,
    FormatConflict,
}

impl ConflictType {
    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConcurrentEdit => "concurrent_edit",
            Self::DeleteUpdate => "delete_update",
            Self::MoveEdit => "move_edit",
            Self::FormatConflict => "format_conflict",
        }
    }
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ResolutionStrategy
// ---------------------------------------------------------------------------

/// The policy used to resolve a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    AutoMerge,
    LastWriterWins,
    FirstWriterWins,
    Manual,
    Fork,
}

impl ResolutionStrategy {
    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoMerge => "auto_merge",
            Self::LastWriterWins => "last_writer_wins",
            Self::FirstWriterWins => "first_writer_wins",
            Self::Manual => "manual",
            Self::Fork => "fork",
        }
    }
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ConflictResolution
// ---------------------------------------------------------------------------

/// The outcome recorded on a conflicted change row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// The incoming change's value stood.
    Accepted,
    /// The already-applied value stood.
    Rejected,
    /// Both edits were combined into a merged value.
    Merged,
    /// Deferred to a human.
    Manual,
}

impl ConflictResolution {
    /// String representation for display, logging, and database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Merged => "merged",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_type_roundtrip() {
        for s in ["insert", "delete", "replace", "move", "format"] {
            assert_eq!(ChangeType::parse(s).unwrap().as_str(), s);
        }
        assert!(ChangeType::parse("rename").is_err());
        assert!(ChangeType::parse("").is_err());
    }

    #[test]
    fn text_range_classification() {
        assert!(ChangeType::Insert.is_text_range());
        assert!(ChangeType::Delete.is_text_range());
        assert!(ChangeType::Replace.is_text_range());
        assert!(!ChangeType::Move.is_text_range());
        assert!(!ChangeType::Format.is_text_range());
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&ConflictType::ConcurrentEdit).unwrap(),
            "\"concurrent_edit\""
        );
        assert_eq!(
            serde_json::to_string(&ResolutionStrategy::LastWriterWins).unwrap(),
            "\"last_writer_wins\""
        );
        let parsed: ConflictResolution = serde_json::from_str("\"merged\"").unwrap();
        assert_eq!(parsed, ConflictResolution::Merged);
    }
}
