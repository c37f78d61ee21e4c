//! Database-backed tests for the entity lock repository.

use sqlx::PgPool;
use uuid::Uuid;

use cowrite_db::models::lock::NewLock;
use cowrite_db::repositories::{EntityLockRepo, LockAttempt};

const THIRTY_MINUTES: i64 = 30 * 60;

async fn acquire(
    pool: &PgPool,
    entity_id: Uuid,
    user_id: Uuid,
    field_path: &str,
    lock_type: &str,
) -> LockAttempt {
    EntityLockRepo::acquire(
        pool,
        &NewLock {
            entity_type: "contact".to_string(),
            entity_id,
            user_id,
            field_path: field_path.to_string(),
            lock_type: lock_type.to_string(),
            duration_secs: THIRTY_MINUTES,
            session_id: None,
        },
    )
    .await
    .unwrap()
}

// ---------------------------------------------------------------------------
// Test: exclusive mutual exclusion
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_exclusive_acquire_is_denied_naming_the_holder(pool: PgPool) {
    let entity = Uuid::new_v4();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let first = acquire(&pool, entity, alice, "description", "exclusive").await;
    assert!(matches!(first, LockAttempt::Acquired(_)));

    let second = acquire(&pool, entity, bob, "description", "exclusive").await;
    match second {
        LockAttempt::Denied(holder) => {
            assert_eq!(holder.user_id, alice);
            assert!(holder.released_at.is_none());
        }
        other => panic!("expected denial, got: {other:?}"),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_exclusive_acquires_admit_exactly_one(pool: PgPool) {
    let entity = Uuid::new_v4();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let user = Uuid::new_v4();
        tasks.push(tokio::spawn(async move {
            acquire(&pool, entity, user, "description", "exclusive").await
        }));
    }

    let mut winners = 0;
    let mut denials = 0;
    for task in tasks {
        match task.await.unwrap() {
            LockAttempt::Acquired(_) => winners += 1,
            LockAttempt::Denied(_) => denials += 1,
        }
    }

    assert_eq!(winners, 1, "exactly one acquisition succeeds");
    assert_eq!(denials, 7);
    assert_eq!(
        EntityLockRepo::get_active(&pool, "contact", entity)
            .await
            .unwrap()
            .len(),
        1
    );
}

// ---------------------------------------------------------------------------
// Test: field-path coverage rules
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn whole_entity_request_conflicts_with_field_lock(pool: PgPool) {
    let entity = Uuid::new_v4();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    // Alice holds a field-scoped exclusive lock.
    let first = acquire(&pool, entity, alice, "description", "exclusive").await;
    assert!(matches!(first, LockAttempt::Acquired(_)));

    // Bob's whole-entity request ('' path) must consider it.
    let second = acquire(&pool, entity, bob, "", "exclusive").await;
    match second {
        LockAttempt::Denied(holder) => assert_eq!(holder.user_id, alice),
        other => panic!("expected denial, got: {other:?}"),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn entity_lock_blocks_every_field(pool: PgPool) {
    let entity = Uuid::new_v4();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let first = acquire(&pool, entity, alice, "", "exclusive").await;
    assert!(matches!(first, LockAttempt::Acquired(_)));

    let second = acquire(&pool, entity, bob, "notes", "exclusive").await;
    assert!(matches!(second, LockAttempt::Denied(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn different_fields_lock_independently(pool: PgPool) {
    let entity = Uuid::new_v4();

    let first = acquire(&pool, entity, Uuid::new_v4(), "description", "exclusive").await;
    let second = acquire(&pool, entity, Uuid::new_v4(), "notes", "exclusive").await;

    assert!(matches!(first, LockAttempt::Acquired(_)));
    assert!(matches!(second, LockAttempt::Acquired(_)));
}

// ---------------------------------------------------------------------------
// Test: shared/intent coexistence
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn shared_locks_coexist_but_block_exclusive(pool: PgPool) {
    let entity = Uuid::new_v4();

    let a = acquire(&pool, entity, Uuid::new_v4(), "notes", "shared").await;
    let b = acquire(&pool, entity, Uuid::new_v4(), "notes", "shared").await;
    let c = acquire(&pool, entity, Uuid::new_v4(), "notes", "intent").await;
    assert!(matches!(a, LockAttempt::Acquired(_)));
    assert!(matches!(b, LockAttempt::Acquired(_)));
    assert!(matches!(c, LockAttempt::Acquired(_)));

    // Any active lock blocks an exclusive request on the same path.
    let exclusive = acquire(&pool, entity, Uuid::new_v4(), "notes", "exclusive").await;
    assert!(matches!(exclusive, LockAttempt::Denied(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn shared_request_is_blocked_only_by_exclusive(pool: PgPool) {
    let entity = Uuid::new_v4();
    let alice = Uuid::new_v4();

    let exclusive = acquire(&pool, entity, alice, "notes", "exclusive").await;
    assert!(matches!(exclusive, LockAttempt::Acquired(_)));

    let shared = acquire(&pool, entity, Uuid::new_v4(), "notes", "shared").await;
    match shared {
        LockAttempt::Denied(holder) => assert_eq!(holder.user_id, alice),
        other => panic!("expected denial, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test: release semantics
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn only_the_holder_can_release(pool: PgPool) {
    let entity = Uuid::new_v4();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let lock = match acquire(&pool, entity, alice, "notes", "exclusive").await {
        LockAttempt::Acquired(lock) => lock,
        other => panic!("expected acquisition, got: {other:?}"),
    };

    // Bob cannot release Alice's lock.
    assert!(EntityLockRepo::release(&pool, lock.id, bob)
        .await
        .unwrap()
        .is_none());

    // Alice can, exactly once.
    let released = EntityLockRepo::release(&pool, lock.id, alice)
        .await
        .unwrap()
        .expect("holder releases");
    assert!(released.released_at.is_some());
    assert!(EntityLockRepo::release(&pool, lock.id, alice)
        .await
        .unwrap()
        .is_none());

    // The path is free again.
    let again = acquire(&pool, entity, bob, "notes", "exclusive").await;
    assert!(matches!(again, LockAttempt::Acquired(_)));
}

// ---------------------------------------------------------------------------
// Test: expiry and cleanup
// ---------------------------------------------------------------------------

/// Force a lock's expiry into the past without releasing it.
async fn expire(pool: &PgPool, lock_id: Uuid) {
    sqlx::query("UPDATE entity_locks SET expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
        .bind(lock_id)
        .execute(pool)
        .await
        .unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn expired_lock_is_inactive_and_swept_by_cleanup(pool: PgPool) {
    let entity = Uuid::new_v4();
    let alice = Uuid::new_v4();

    let lock = match acquire(&pool, entity, alice, "notes", "exclusive").await {
        LockAttempt::Acquired(lock) => lock,
        other => panic!("expected acquisition, got: {other:?}"),
    };
    expire(&pool, lock.id).await;

    // Expired-but-unreleased: not active, does not block new acquisitions.
    assert!(EntityLockRepo::get_active(&pool, "contact", entity)
        .await
        .unwrap()
        .is_empty());
    let again = acquire(&pool, entity, Uuid::new_v4(), "notes", "exclusive").await;
    assert!(matches!(again, LockAttempt::Acquired(_)));

    // The sweep flips the stale row to released (the new lock is live).
    let swept = EntityLockRepo::cleanup_expired(&pool).await.unwrap();
    assert_eq!(swept, 1);

    let row: (Option<chrono::DateTime<chrono::Utc>>,) =
        sqlx::query_as("SELECT released_at FROM entity_locks WHERE id = $1")
            .bind(lock.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(row.0.is_some(), "cleanup sets released_at");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn extend_is_bounded_by_max_duration(pool: PgPool) {
    let entity = Uuid::new_v4();
    let alice = Uuid::new_v4();

    let lock = match acquire(&pool, entity, alice, "notes", "exclusive").await {
        LockAttempt::Acquired(lock) => lock,
        other => panic!("expected acquisition, got: {other:?}"),
    };

    let extended = EntityLockRepo::extend(&pool, lock.id, alice, THIRTY_MINUTES)
        .await
        .unwrap()
        .expect("holder extends");
    assert!(extended.expires_at >= lock.expires_at);

    let cap = lock.acquired_at + chrono::Duration::seconds(lock.max_duration_secs);
    assert!(extended.expires_at <= cap);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn disconnect_releases_auto_release_locks(pool: PgPool) {
    let alice = Uuid::new_v4();

    let a = acquire(&pool, Uuid::new_v4(), alice, "notes", "exclusive").await;
    let b = acquire(&pool, Uuid::new_v4(), alice, "", "exclusive").await;
    assert!(matches!(a, LockAttempt::Acquired(_)));
    assert!(matches!(b, LockAttempt::Acquired(_)));

    let released = EntityLockRepo::release_auto_for_user(&pool, alice)
        .await
        .unwrap();
    assert_eq!(released.len(), 2);
    assert!(released.iter().all(|l| l.released_at.is_some()));
}
