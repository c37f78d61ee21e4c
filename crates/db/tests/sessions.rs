//! Database-backed tests for sessions, participants, presence, versions,
//! and comments.

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use cowrite_db::models::comment::CreateCommentRequest;
use cowrite_db::models::session::SessionOptions;
use cowrite_db::repositories::{
    CommentRepo, EntityVersionRepo, ParticipantRepo, PresenceRepo, SessionRepo,
};

// ---------------------------------------------------------------------------
// Test: session get-or-create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn get_or_create_converges_on_one_active_session(pool: PgPool) {
    let entity = Uuid::new_v4();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let options = SessionOptions::default();

    let (first, created_first) =
        SessionRepo::get_or_create(&pool, "contact", entity, alice, &options)
            .await
            .unwrap();
    assert!(created_first);
    assert!(first.is_active);
    assert_eq!(first.created_by, alice);

    let (second, created_second) =
        SessionRepo::get_or_create(&pool, "contact", entity, bob, &options)
            .await
            .unwrap();
    assert!(!created_second, "second caller joins the existing session");
    assert_eq!(second.id, first.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn ended_session_frees_the_entity_for_a_new_one(pool: PgPool) {
    let entity = Uuid::new_v4();
    let user = Uuid::new_v4();
    let options = SessionOptions::default();

    let (session, _) = SessionRepo::get_or_create(&pool, "contact", entity, user, &options)
        .await
        .unwrap();

    let ended = SessionRepo::end(&pool, session.id).await.unwrap().unwrap();
    assert!(!ended.is_active);
    assert!(ended.ended_at.is_some());

    // Ending twice is a no-op.
    assert!(SessionRepo::end(&pool, session.id).await.unwrap().is_none());

    assert!(
        SessionRepo::get_active_for_entity(&pool, "contact", entity)
            .await
            .unwrap()
            .is_none()
    );

    let (fresh, created) = SessionRepo::get_or_create(&pool, "contact", entity, user, &options)
        .await
        .unwrap();
    assert!(created);
    assert_ne!(fresh.id, session.id);
}

// ---------------------------------------------------------------------------
// Test: participant upsert and soft-close
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn rejoin_reactivates_a_disconnected_participant(pool: PgPool) {
    let user = Uuid::new_v4();
    let (session, _) = SessionRepo::get_or_create(
        &pool,
        "contact",
        Uuid::new_v4(),
        user,
        &SessionOptions::default(),
    )
    .await
    .unwrap();

    let joined = ParticipantRepo::upsert_join(&pool, session.id, user, "editor")
        .await
        .unwrap();
    assert_eq!(joined.status, "active");
    assert_eq!(joined.role, "editor");

    assert!(ParticipantRepo::leave(&pool, session.id, user).await.unwrap());
    let left = ParticipantRepo::get(&pool, session.id, user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(left.status, "disconnected");
    assert!(left.left_at.is_some());

    // Re-entry is an upsert: same row, reactivated, role preserved.
    let rejoined = ParticipantRepo::upsert_join(&pool, session.id, user, "viewer")
        .await
        .unwrap();
    assert_eq!(rejoined.id, joined.id);
    assert_eq!(rejoined.status, "active");
    assert!(rejoined.left_at.is_none());
    assert_eq!(rejoined.role, "editor", "rejoin does not change the role");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn cursor_updates_require_a_participant_row(pool: PgPool) {
    let user = Uuid::new_v4();
    let (session, _) = SessionRepo::get_or_create(
        &pool,
        "contact",
        Uuid::new_v4(),
        user,
        &SessionOptions::default(),
    )
    .await
    .unwrap();

    let cursor = json!({"field": "notes", "offset": 12});
    assert!(
        !ParticipantRepo::update_cursor(&pool, session.id, user, &cursor)
            .await
            .unwrap(),
        "no participant row yet"
    );

    ParticipantRepo::upsert_join(&pool, session.id, user, "editor")
        .await
        .unwrap();
    assert!(
        ParticipantRepo::update_cursor(&pool, session.id, user, &cursor)
            .await
            .unwrap()
    );

    let row = ParticipantRepo::get(&pool, session.id, user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.cursor_position, Some(cursor));
}

// ---------------------------------------------------------------------------
// Test: presence upsert / stale sweep
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn presence_is_one_row_per_user(pool: PgPool) {
    let user = Uuid::new_v4();

    let first = PresenceRepo::set_online(&pool, user, "conn-1").await.unwrap();
    let second = PresenceRepo::set_online(&pool, user, "conn-2").await.unwrap();

    assert_eq!(first.id, second.id, "reconnect reuses the row");
    assert_eq!(second.connection_id.as_deref(), Some("conn-2"));
    assert_eq!(second.status, "online");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn offline_clears_transient_state(pool: PgPool) {
    let user = Uuid::new_v4();

    PresenceRepo::set_online(&pool, user, "conn-1").await.unwrap();
    PresenceRepo::set_typing(&pool, user, true, Some("notes"))
        .await
        .unwrap();

    let offline = PresenceRepo::set_offline(&pool, user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(offline.status, "offline");
    assert!(!offline.is_typing);
    assert!(offline.typing_field.is_none());
    assert!(offline.connection_id.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn entity_filter_only_returns_users_on_that_entity(pool: PgPool) {
    let entity = Uuid::new_v4();
    let here = Uuid::new_v4();
    let elsewhere = Uuid::new_v4();

    PresenceRepo::set_online(&pool, here, "c-1").await.unwrap();
    PresenceRepo::update_location(&pool, here, Some("/contacts/1"), Some("contact"), Some(entity))
        .await
        .unwrap();
    PresenceRepo::set_online(&pool, elsewhere, "c-2").await.unwrap();

    let on_entity = PresenceRepo::get_online_for_entity(&pool, "contact", entity)
        .await
        .unwrap();
    assert_eq!(on_entity.len(), 1);
    assert_eq!(on_entity[0].user_id, here);

    assert_eq!(PresenceRepo::get_online(&pool).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn stale_presence_is_swept_offline(pool: PgPool) {
    let user = Uuid::new_v4();
    PresenceRepo::set_online(&pool, user, "conn-1").await.unwrap();

    // Age the heartbeat past the stale window.
    sqlx::query(
        "UPDATE user_presence SET last_heartbeat = NOW() - INTERVAL '10 minutes' \
         WHERE user_id = $1",
    )
    .bind(user)
    .execute(&pool)
    .await
    .unwrap();

    let swept = PresenceRepo::cleanup_stale(&pool, 120).await.unwrap();
    assert_eq!(swept, 1);
    assert!(PresenceRepo::get_online(&pool).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: version store uniqueness backstop
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_version_numbers_are_rejected(pool: PgPool) {
    let entity = Uuid::new_v4();
    let mut conn = pool.acquire().await.unwrap();

    EntityVersionRepo::insert(&mut conn, "contact", entity, 1, &json!({"a": 1}), &[])
        .await
        .unwrap();

    let dup = EntityVersionRepo::insert(&mut conn, "contact", entity, 1, &json!({"a": 2}), &[])
        .await;
    assert!(dup.is_err(), "unique (entity, version) must hold");

    let latest = EntityVersionRepo::latest(&mut conn, "contact", entity)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.version, 1);
    assert_eq!(latest.snapshot, json!({"a": 1}));
}

// ---------------------------------------------------------------------------
// Test: comment threads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn replies_inherit_the_thread_root(pool: PgPool) {
    let entity = Uuid::new_v4();
    let author = Uuid::new_v4();

    let root = CommentRepo::create(
        &pool,
        author,
        &CreateCommentRequest {
            entity_type: "contact".to_string(),
            entity_id: entity,
            field_path: Some("notes".to_string()),
            range_start: Some(0),
            range_end: Some(5),
            body: "Is this right?".to_string(),
            parent_id: None,
        },
    )
    .await
    .unwrap();
    assert!(root.thread_root_id.is_none(), "roots have no back-reference");

    let reply = CommentRepo::create(
        &pool,
        Uuid::new_v4(),
        &CreateCommentRequest {
            entity_type: "contact".to_string(),
            entity_id: entity,
            field_path: None,
            range_start: None,
            range_end: None,
            body: "Looks fine to me.".to_string(),
            parent_id: Some(root.id),
        },
    )
    .await
    .unwrap();
    assert_eq!(reply.thread_root_id, Some(root.id));

    // A reply to the reply still points at the original root.
    let nested = CommentRepo::create(
        &pool,
        author,
        &CreateCommentRequest {
            entity_type: "contact".to_string(),
            entity_id: entity,
            field_path: None,
            range_start: None,
            range_end: None,
            body: "Agreed.".to_string(),
            parent_id: Some(reply.id),
        },
    )
    .await
    .unwrap();
    assert_eq!(nested.thread_root_id, Some(root.id));

    let thread = CommentRepo::list_thread(&pool, root.id).await.unwrap();
    assert_eq!(thread.len(), 3);

    let resolved = CommentRepo::update(&pool, root.id, None, Some("resolved"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.status, "resolved");
}
