//! Periodic sweep of stale presence rows.
//!
//! A user whose heartbeat stops (crashed tab, dropped network) would stay
//! "online" forever without this; the sweep flips rows older than the
//! stale timeout to offline.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use cowrite_core::collaboration::{PRESENCE_CLEANUP_INTERVAL_SECS, PRESENCE_STALE_TIMEOUT_SECS};
use cowrite_db::repositories::PresenceRepo;

/// Run the stale-presence cleanup loop until `cancel` is triggered.
pub async fn run(pool: PgPool, cancel: CancellationToken) {
    let stale_secs: i64 = std::env::var("PRESENCE_STALE_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(PRESENCE_STALE_TIMEOUT_SECS);

    tracing::info!(
        stale_secs,
        interval_secs = PRESENCE_CLEANUP_INTERVAL_SECS,
        "Presence cleanup job started"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(PRESENCE_CLEANUP_INTERVAL_SECS));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Presence cleanup job stopping");
                break;
            }
            _ = interval.tick() => {
                match PresenceRepo::cleanup_stale(&pool, stale_secs).await {
                    Ok(swept) => {
                        if swept > 0 {
                            tracing::info!(swept, "Presence cleanup: marked stale users offline");
                        } else {
                            tracing::debug!("Presence cleanup: no stale rows");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Presence cleanup failed");
                    }
                }
            }
        }
    }
}
