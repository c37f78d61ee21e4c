//! Change coordination: versioned, conflict-checked application of edits.
//!
//! `apply_change` is the one strictly serialized operation in the system.
//! It runs inside a transaction that first takes the per-entity advisory
//! lock, so two coordinators can never read the same latest version and
//! double-assign a version number — the version sequence for an entity is
//! gapless by construction.

use serde_json::Value;

use cowrite_core::change::{ChangeType, ConflictResolution, ConflictType, ResolutionStrategy};
use cowrite_core::collaboration::validate_field_path;
use cowrite_core::conflict::{detect_conflict, resolve_conflict, ChangeOp};
use cowrite_core::error::CoreError;
use cowrite_core::fieldpath;
use cowrite_core::types::Id;
use cowrite_db::models::change::{
    CollaborationChange, ConflictRecord, EntityVersion, NewChange, NewConflictRecord,
};
use cowrite_db::models::session::CollaborationSession;
use cowrite_db::repositories::{
    ChangeRepo, ConflictRecordRepo, EntityVersionRepo, ParticipantRepo, SessionRepo,
};
use cowrite_db::DbPool;

use crate::error::AppError;

/// The edit operation handed to [`ChangeCoordinator::apply_change`].
#[derive(Debug, Clone)]
pub struct ApplyChangeInput {
    pub field_path: String,
    pub change_type: String,
    pub old_value: Value,
    pub new_value: Value,
    pub position: Option<i64>,
    pub length: Option<i64>,
    /// The entity version the client's edit assumed, when the client
    /// reports one. Edits applied after that version by other users are
    /// the concurrent candidates. Omitted means "against latest" — no
    /// concurrency window, no conflict detection.
    pub base_version: Option<i64>,
}

/// What `apply_change` produced.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub session: CollaborationSession,
    pub change: CollaborationChange,
    /// Present when the change collided with a concurrent edit.
    pub conflict: Option<ConflictRecord>,
    /// The value that ended up in the new snapshot (the merged value when
    /// a conflict was resolved, else the submitted new value).
    pub resolved_value: Value,
    pub version: EntityVersion,
}

/// Orchestrates applying an incoming change: read version, detect
/// concurrency, resolve via the pure conflict resolver, persist.
///
/// Deliberately does not publish events itself: the calling boundary owns
/// the `change:applied` / `change:conflict_resolved` fan-out, and errors go
/// back to the originating connection only.
#[derive(Clone)]
pub struct ChangeCoordinator {
    pool: DbPool,
}

impl ChangeCoordinator {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Apply one edit for `user_id` in `session_id`.
    ///
    /// The caller (the WebSocket consumer) publishes `change:applied` or
    /// `change:conflict_resolved` from the returned outcome; errors go back
    /// to the originating connection only, never broadcast.
    pub async fn apply_change(
        &self,
        session_id: Id,
        user_id: Id,
        input: ApplyChangeInput,
    ) -> Result<ApplyOutcome, AppError> {
        validate_field_path(&input.field_path, false)?;
        let change_type = ChangeType::parse(&input.change_type)?;

        // 1. Resolve the session and the acting participant.
        let session = SessionRepo::get(&self.pool, session_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or(CoreError::NotFound {
                entity: "session",
                id: session_id,
            })?;
        let participant = ParticipantRepo::get(&self.pool, session_id, user_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "participant",
                id: user_id,
            })?;

        // Steps 2-5 run under the per-entity advisory lock.
        let mut tx = self.pool.begin().await?;
        cowrite_db::lock_entity_for_write(&mut *tx, &session.entity_type, session.entity_id)
            .await?;

        // 2. Latest version; no row reads as version 0.
        let latest =
            EntityVersionRepo::latest(&mut *tx, &session.entity_type, session.entity_id).await?;
        let (current_version, snapshot) = match &latest {
            Some(v) => (v.version, v.snapshot.clone()),
            None => (0, Value::Object(Default::default())),
        };
        let new_version = current_version + 1;
        let assumed_base = input
            .base_version
            .unwrap_or(current_version)
            .clamp(0, current_version);

        // 3. Concurrent candidates: applied changes on the same field that
        //    the author had not seen (their base at or after the assumed
        //    version), authored by someone else.
        let candidates = ChangeRepo::find_concurrent(
            &mut *tx,
            session_id,
            &input.field_path,
            assumed_base,
            user_id,
        )
        .await?;

        // 4. First detected conflict wins; the rest of the candidates are
        //    already reflected in the snapshot the merge builds on.
        let local = ChangeOp {
            change_type,
            field_path: input.field_path.clone(),
            old_value: input.old_value.clone(),
            new_value: input.new_value.clone(),
            position: input.position,
            length: input.length,
            created_at: chrono::Utc::now(),
        };

        let mut detected: Option<(ConflictType, &CollaborationChange, ChangeOp)> = None;
        for candidate in &candidates {
            let remote = ChangeOp {
                change_type: ChangeType::parse(&candidate.change_type)?,
                field_path: candidate.field_path.clone(),
                old_value: candidate.old_value.clone().unwrap_or(Value::Null),
                new_value: candidate.new_value.clone().unwrap_or(Value::Null),
                position: candidate.position,
                length: candidate.length,
                created_at: candidate.created_at,
            };
            if let Some(conflict_type) = detect_conflict(&local, &remote) {
                detected = Some((conflict_type, candidate, remote));
                break;
            }
        }

        let outcome = match detected {
            Some((conflict_type, candidate, remote)) => {
                let strategy = if change_type.is_text_range() {
                    ResolutionStrategy::AutoMerge
                } else {
                    ResolutionStrategy::LastWriterWins
                };
                let resolved_value = resolve_conflict(conflict_type, &local, &remote, strategy);
                let resolution = match strategy {
                    ResolutionStrategy::AutoMerge => ConflictResolution::Merged,
                    _ if resolved_value == local.new_value => ConflictResolution::Accepted,
                    _ => ConflictResolution::Rejected,
                };

                let change = ChangeRepo::insert(
                    &mut *tx,
                    &NewChange {
                        session_id,
                        participant_id: participant.id,
                        user_id,
                        change_type: change_type.as_str().to_string(),
                        field_path: input.field_path.clone(),
                        old_value: input.old_value.clone(),
                        new_value: input.new_value.clone(),
                        position: input.position,
                        length: input.length,
                        base_version: new_version - 1,
                        result_version: new_version,
                        is_conflicted: true,
                        conflict_resolution: Some(resolution.as_str().to_string()),
                    },
                )
                .await?;

                let conflict = ConflictRecordRepo::insert(
                    &mut *tx,
                    &NewConflictRecord {
                        local_change_id: change.id,
                        remote_change_id: candidate.id,
                        conflict_type: conflict_type.as_str().to_string(),
                        field_path: input.field_path.clone(),
                        resolution_strategy: strategy.as_str().to_string(),
                        resolved_value: resolved_value.clone(),
                        resolved_by: user_id,
                    },
                )
                .await?;

                tracing::info!(
                    session_id = %session_id,
                    user_id = %user_id,
                    field_path = %input.field_path,
                    conflict_type = %conflict_type,
                    strategy = %strategy,
                    version = new_version,
                    "Conflict resolved"
                );

                (change, Some(conflict), resolved_value)
            }
            None => {
                let change = ChangeRepo::insert(
                    &mut *tx,
                    &NewChange {
                        session_id,
                        participant_id: participant.id,
                        user_id,
                        change_type: change_type.as_str().to_string(),
                        field_path: input.field_path.clone(),
                        old_value: input.old_value.clone(),
                        new_value: input.new_value.clone(),
                        position: input.position,
                        length: input.length,
                        base_version: new_version - 1,
                        result_version: new_version,
                        is_conflicted: false,
                        conflict_resolution: None,
                    },
                )
                .await?;

                (change, None, input.new_value.clone())
            }
        };
        let (change, conflict, resolved_value) = outcome;

        // 5. Append the new version: previous snapshot with this field's
        //    resolved value written in.
        let mut new_snapshot = snapshot;
        fieldpath::set(&mut new_snapshot, &input.field_path, resolved_value.clone());
        let version = EntityVersionRepo::insert(
            &mut *tx,
            &session.entity_type,
            session.entity_id,
            new_version,
            &new_snapshot,
            &[change.id],
        )
        .await?;

        tx.commit().await?;

        // Outside the serialized scope: bump session activity.
        SessionRepo::touch(&self.pool, session_id).await?;

        Ok(ApplyOutcome {
            session,
            change,
            conflict,
            resolved_value,
            version,
        })
    }
}
