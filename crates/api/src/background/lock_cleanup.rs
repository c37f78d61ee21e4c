//! Periodic sweep of expired entity locks.
//!
//! Runs on a fixed interval using `tokio::time::interval`, flipping every
//! expired-but-unreleased lock to released. The sweep is maintenance, not
//! a user action: no per-lock broadcast goes out, matching the behavior
//! clients rely on (they discover expiry on their next lock query).

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use cowrite_core::collaboration::LOCK_CLEANUP_INTERVAL_SECS;
use cowrite_db::repositories::EntityLockRepo;

/// Run the expired-lock cleanup loop until `cancel` is triggered.
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    let interval_secs: u64 = std::env::var("LOCK_CLEANUP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(LOCK_CLEANUP_INTERVAL_SECS);

    tracing::info!(interval_secs, "Lock cleanup job started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lock cleanup job stopping");
                break;
            }
            _ = interval.tick() => {
                match EntityLockRepo::cleanup_expired(&pool).await {
                    Ok(released) => {
                        if released > 0 {
                            tracing::info!(released, "Lock cleanup: released expired locks");
                        } else {
                            tracing::debug!("Lock cleanup: nothing to release");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Lock cleanup failed");
                    }
                }
            }
        }
    }
}
