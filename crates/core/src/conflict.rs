//! Pure conflict detection and resolution.
//!
//! No I/O and no clock reads: everything is computed from the two change
//! operations passed in, so identical inputs always produce identical
//! outputs. This is not a general OT engine — the auto-merge is a
//! simplified two-operation transform that assumes both operations were
//! produced against the same base text.

use serde_json::Value;

use crate::change::{ChangeType, ConflictType, ResolutionStrategy};
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// ChangeOp
// ---------------------------------------------------------------------------

/// The slice of a collaboration change that conflict logic reads.
///
/// The repository row carries more (session, participant, versions); the
/// resolver deliberately sees only the edit itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeOp {
    pub change_type: ChangeType,
    pub field_path: String,
    pub old_value: Value,
    pub new_value: Value,
    /// Character offset for text-range operations.
    pub position: Option<i64>,
    /// Affected character count; inserts have length 0.
    pub length: Option<i64>,
    pub created_at: Timestamp,
}

impl ChangeOp {
    /// The half-open `[start, end)` interval this operation touches.
    fn interval(&self) -> (i64, i64) {
        let start = self.position.unwrap_or(0);
        let len = self.length.unwrap_or(0).max(0);
        (start, start + len)
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Decide whether two concurrent changes to the same entity collide.
///
/// Returns `None` when the edits are independent:
/// 1. Different field paths never conflict.
/// 2. Two text-range operations conflict iff their half-open intervals
///    overlap (`local.start < remote.end && remote.start < local.end`).
/// 3. Otherwise, if exactly one side is a delete, the pair is a
///    delete-update conflict.
pub fn detect_conflict(local: &ChangeOp, remote: &ChangeOp) -> Option<ConflictType> {
    if local.field_path != remote.field_path {
        return None;
    }

    if local.change_type.is_text_range() && remote.change_type.is_text_range() {
        let (ls, le) = local.interval();
        let (rs, re) = remote.interval();
        if ls < re && rs < le {
            return Some(ConflictType::ConcurrentEdit);
        }
        return None;
    }

    let local_is_delete = local.change_type == ChangeType::Delete;
    let remote_is_delete = remote.change_type == ChangeType::Delete;
    if local_is_delete != remote_is_delete {
        return Some(ConflictType::DeleteUpdate);
    }

    None
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Compute the resolved value for a detected conflict.
///
/// Never errors: an inapplicable strategy (auto-merge on non-text values,
/// manual, fork) falls back to the local change's new value.
pub fn resolve_conflict(
    conflict_type: ConflictType,
    local: &ChangeOp,
    remote: &ChangeOp,
    strategy: ResolutionStrategy,
) -> Value {
    match strategy {
        // Chronologically later change wins; ties favor local.
        ResolutionStrategy::LastWriterWins => {
            if remote.created_at > local.created_at {
                remote.new_value.clone()
            } else {
                local.new_value.clone()
            }
        }
        // Chronologically earlier change wins; ties favor local.
        ResolutionStrategy::FirstWriterWins => {
            if remote.created_at < local.created_at {
                remote.new_value.clone()
            } else {
                local.new_value.clone()
            }
        }
        ResolutionStrategy::AutoMerge if conflict_type == ConflictType::ConcurrentEdit => {
            match auto_merge(local, remote) {
                Some(merged) => Value::String(merged),
                None => local.new_value.clone(),
            }
        }
        _ => local.new_value.clone(),
    }
}

/// Two-operation text merge.
///
/// The earlier-positioned operation is applied to its own base text first;
/// the second is then applied at a position shifted by the length delta the
/// first introduced. Returns `None` when either operation's values are not
/// plain strings (auto-merge is text-only).
fn auto_merge(local: &ChangeOp, remote: &ChangeOp) -> Option<String> {
    // Order by position, then by timestamp, then local-first. The ordering
    // must not depend on which side was passed as `local`.
    let local_first = match local.position.unwrap_or(0).cmp(&remote.position.unwrap_or(0)) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => local.created_at <= remote.created_at,
    };
    let (first, second) = if local_first {
        (local, remote)
    } else {
        (remote, local)
    };

    let base = first.old_value.as_str()?;
    let first_new = first.new_value.as_str()?;
    let second_new = second.new_value.as_str()?;

    let (first_pos, _) = first.interval();
    let first_len = first.length.unwrap_or(0).max(0);
    let merged = splice_chars(base, first_pos, first_len, first_new);

    let shift = first_new.chars().count() as i64 - first_len;
    let (second_pos, _) = second.interval();
    let second_len = second.length.unwrap_or(0).max(0);
    Some(splice_chars(
        &merged,
        second_pos + shift,
        second_len,
        second_new,
    ))
}

/// Replace the `len` characters starting at char offset `pos` with `text`.
///
/// Offsets are character offsets (not bytes) and are clamped to the string
/// bounds, so a slightly-off client offset degrades instead of panicking.
fn splice_chars(base: &str, pos: i64, len: i64, text: &str) -> String {
    let chars: Vec<char> = base.chars().collect();
    let pos = (pos.max(0) as usize).min(chars.len());
    let end = (pos + len.max(0) as usize).min(chars.len());

    let mut out = String::with_capacity(base.len() + text.len());
    out.extend(&chars[..pos]);
    out.push_str(text);
    out.extend(&chars[end..]);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
