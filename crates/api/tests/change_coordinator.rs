//! Database-backed tests for the change coordinator and session manager.
//!
//! Run with `DATABASE_URL` pointing at a Postgres instance; `sqlx::test`
//! provisions an isolated schema per test from `db/migrations`.

use std::sync::Arc;

use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use cowrite_api::collab::{ApplyChangeInput, ChangeCoordinator, SessionManager};
use cowrite_db::models::session::SessionOptions;
use cowrite_events::EventBus;

fn services(pool: &PgPool) -> (SessionManager, ChangeCoordinator) {
    let bus = Arc::new(EventBus::default());
    (
        SessionManager::new(pool.clone(), bus),
        ChangeCoordinator::new(pool.clone()),
    )
}

fn change(field: &str, change_type: &str, old: Value, new: Value) -> ApplyChangeInput {
    ApplyChangeInput {
        field_path: field.to_string(),
        change_type: change_type.to_string(),
        old_value: old,
        new_value: new,
        position: None,
        length: None,
        base_version: None,
    }
}

// ---------------------------------------------------------------------------
// Test: basic apply path
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn clean_changes_advance_versions_gaplessly(pool: PgPool) {
    let (sessions, coordinator) = services(&pool);
    let user = Uuid::new_v4();
    let entity = Uuid::new_v4();

    let (session, created) = sessions
        .get_or_create("contact", entity, user, &SessionOptions::default())
        .await
        .unwrap();
    assert!(created);

    for (i, value) in ["a", "b", "c"].iter().enumerate() {
        let outcome = coordinator
            .apply_change(
                session.id,
                user,
                change("notes", "replace", json!(""), json!(value)),
            )
            .await
            .unwrap();

        let expected = (i + 1) as i64;
        assert_eq!(outcome.version.version, expected);
        assert_eq!(outcome.change.result_version, expected);
        assert_eq!(outcome.change.base_version, expected - 1);
        assert!(!outcome.change.is_conflicted);
        assert_eq!(outcome.version.snapshot["notes"], json!(value));
        assert_eq!(outcome.version.change_ids, vec![outcome.change.id]);
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn apply_change_on_unknown_session_fails_not_found(pool: PgPool) {
    let (_, coordinator) = services(&pool);

    let err = coordinator
        .apply_change(
            Uuid::new_v4(),
            Uuid::new_v4(),
            change("notes", "insert", json!(""), json!("x")),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("not found"), "got: {err}");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn apply_change_requires_a_participant_row(pool: PgPool) {
    let (sessions, coordinator) = services(&pool);
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let (session, _) = sessions
        .get_or_create("contact", Uuid::new_v4(), owner, &SessionOptions::default())
        .await
        .unwrap();

    // The stranger never joined the session.
    let err = coordinator
        .apply_change(
            session.id,
            stranger,
            change("notes", "insert", json!(""), json!("x")),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("not found"), "got: {err}");
}

// ---------------------------------------------------------------------------
// Test: concurrent edit merge (the canonical two-writer scenario)
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_replace_and_insert_auto_merge(pool: PgPool) {
    let (sessions, coordinator) = services(&pool);
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let entity = Uuid::new_v4();

    let (session, _) = sessions
        .get_or_create("document", entity, alice, &SessionOptions::default())
        .await
        .unwrap();
    sessions.join(session.id, bob, None).await.unwrap();

    // Bring the entity to version 3 with the field reading "Hello".
    for value in ["H", "He", "Hello"] {
        coordinator
            .apply_change(
                session.id,
                alice,
                change("notes", "replace", json!(""), json!(value)),
            )
            .await
            .unwrap();
    }

    // Alice: replace [0, 5) "Hello" -> "HELLO", against version 3.
    let a = coordinator
        .apply_change(
            session.id,
            alice,
            ApplyChangeInput {
                field_path: "notes".to_string(),
                change_type: "replace".to_string(),
                old_value: json!("Hello"),
                new_value: json!("HELLO"),
                position: Some(0),
                length: Some(5),
                base_version: Some(3),
            },
        )
        .await
        .unwrap();
    assert_eq!(a.version.version, 4);
    assert!(!a.change.is_conflicted, "first writer applies cleanly");

    // Bob: insert "XX" at 3, also against version 3. The intervals
    // [0, 5) and [3, 3) overlap, so this is a concurrent edit.
    let b = coordinator
        .apply_change(
            session.id,
            bob,
            ApplyChangeInput {
                field_path: "notes".to_string(),
                change_type: "insert".to_string(),
                old_value: json!(""),
                new_value: json!("XX"),
                position: Some(3),
                length: Some(0),
                base_version: Some(3),
            },
        )
        .await
        .unwrap();

    assert_eq!(b.version.version, 5, "merged edit becomes version 5");
    assert!(b.change.is_conflicted);
    assert_eq!(b.change.conflict_resolution.as_deref(), Some("merged"));

    let conflict = b.conflict.expect("conflict record is persisted");
    assert_eq!(conflict.conflict_type, "concurrent_edit");
    assert_eq!(conflict.resolution_strategy, "auto_merge");
    assert_eq!(conflict.remote_change_id, a.change.id);
    assert_eq!(conflict.local_change_id, b.change.id);

    // Both edits survive, applied in position order.
    assert_eq!(b.resolved_value, json!("HELXXLO"));
    assert_eq!(b.version.snapshot["notes"], json!("HELXXLO"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn non_overlapping_edits_do_not_conflict(pool: PgPool) {
    let (sessions, coordinator) = services(&pool);
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let (session, _) = sessions
        .get_or_create("document", Uuid::new_v4(), alice, &SessionOptions::default())
        .await
        .unwrap();
    sessions.join(session.id, bob, None).await.unwrap();

    coordinator
        .apply_change(
            session.id,
            alice,
            change("notes", "replace", json!(""), json!("abcdef")),
        )
        .await
        .unwrap();

    // Alice touches [0, 2), Bob touches [4, 6) -- disjoint intervals.
    coordinator
        .apply_change(
            session.id,
            alice,
            ApplyChangeInput {
                field_path: "notes".to_string(),
                change_type: "replace".to_string(),
                old_value: json!("abcdef"),
                new_value: json!("AB"),
                position: Some(0),
                length: Some(2),
                base_version: Some(1),
            },
        )
        .await
        .unwrap();

    let b = coordinator
        .apply_change(
            session.id,
            bob,
            ApplyChangeInput {
                field_path: "notes".to_string(),
                change_type: "replace".to_string(),
                old_value: json!("abcdef"),
                new_value: json!("EF"),
                position: Some(4),
                length: Some(2),
                base_version: Some(1),
            },
        )
        .await
        .unwrap();

    assert!(!b.change.is_conflicted);
    assert!(b.conflict.is_none());
    assert_eq!(b.version.version, 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn edits_on_different_fields_never_conflict(pool: PgPool) {
    let (sessions, coordinator) = services(&pool);
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let (session, _) = sessions
        .get_or_create("contact", Uuid::new_v4(), alice, &SessionOptions::default())
        .await
        .unwrap();
    sessions.join(session.id, bob, None).await.unwrap();

    coordinator
        .apply_change(
            session.id,
            alice,
            change("name", "replace", json!(""), json!("Ada")),
        )
        .await
        .unwrap();

    let b = coordinator
        .apply_change(session.id, bob, {
            let mut input = change("email", "replace", json!(""), json!("ada@example.com"));
            input.base_version = Some(0);
            input
        })
        .await
        .unwrap();

    assert!(!b.change.is_conflicted);
    assert_eq!(b.version.snapshot["name"], json!("Ada"));
    assert_eq!(b.version.snapshot["email"], json!("ada@example.com"));
}

// ---------------------------------------------------------------------------
// Test: delete vs non-text edit
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn delete_against_format_is_delete_update(pool: PgPool) {
    let (sessions, coordinator) = services(&pool);
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let (session, _) = sessions
        .get_or_create("document", Uuid::new_v4(), alice, &SessionOptions::default())
        .await
        .unwrap();
    sessions.join(session.id, bob, None).await.unwrap();

    // Alice deletes the field content.
    coordinator
        .apply_change(
            session.id,
            alice,
            change("notes", "delete", json!("old text"), json!("")),
        )
        .await
        .unwrap();

    // Bob, still on version 0, formats the same field. Format is not a
    // text-range op, so the pair resolves via last-writer-wins.
    let b = coordinator
        .apply_change(session.id, bob, {
            let mut input = change(
                "notes",
                "format",
                json!("old text"),
                json!({"bold": true}),
            );
            input.base_version = Some(0);
            input
        })
        .await
        .unwrap();

    assert!(b.change.is_conflicted);
    let conflict = b.conflict.expect("conflict record");
    assert_eq!(conflict.conflict_type, "delete_update");
    assert_eq!(conflict.resolution_strategy, "last_writer_wins");
    // Bob's edit is chronologically later, so his value stands.
    assert_eq!(b.change.conflict_resolution.as_deref(), Some("accepted"));
    assert_eq!(b.resolved_value, json!({"bold": true}));
}

// ---------------------------------------------------------------------------
// Test: version monotonicity under concurrency
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_writers_never_duplicate_a_version(pool: PgPool) {
    let (sessions, coordinator) = services(&pool);
    let entity = Uuid::new_v4();
    let owner = Uuid::new_v4();

    let (session, _) = sessions
        .get_or_create("document", entity, owner, &SessionOptions::default())
        .await
        .unwrap();

    // Four users, five changes each, all racing on the same entity.
    let users: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    for user in &users {
        sessions.join(session.id, *user, None).await.unwrap();
    }

    let mut tasks = Vec::new();
    for (u, user) in users.iter().enumerate() {
        for i in 0..5 {
            let coordinator = coordinator.clone();
            let session_id = session.id;
            let user = *user;
            tasks.push(tokio::spawn(async move {
                coordinator
                    .apply_change(
                        session_id,
                        user,
                        change(
                            &format!("field_{u}"),
                            "replace",
                            json!(""),
                            json!(format!("value-{u}-{i}")),
                        ),
                    )
                    .await
            }));
        }
    }

    let mut versions: Vec<i64> = Vec::new();
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(
            outcome.change.result_version,
            outcome.change.base_version + 1
        );
        versions.push(outcome.version.version);
    }

    // Exactly 1..K with no gaps and no duplicates.
    versions.sort_unstable();
    let expected: Vec<i64> = (1..=20).collect();
    assert_eq!(versions, expected);
}

// ---------------------------------------------------------------------------
// Test: session lifecycle edges
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn joining_an_ended_session_fails_not_found(pool: PgPool) {
    let (sessions, _) = services(&pool);
    let owner = Uuid::new_v4();
    let entity = Uuid::new_v4();

    let (session, _) = sessions
        .get_or_create("contact", entity, owner, &SessionOptions::default())
        .await
        .unwrap();
    sessions.end(session.id).await.unwrap();

    let err = sessions
        .join(session.id, Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"), "got: {err}");

    // get_or_create starts a fresh session for the same entity.
    let (fresh, created) = sessions
        .get_or_create("contact", entity, owner, &SessionOptions::default())
        .await
        .unwrap();
    assert!(created);
    assert_ne!(fresh.id, session.id);
}
