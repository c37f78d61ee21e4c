//! Event fan-out: bus → connection hub.
//!
//! One task subscribes to the event bus and delivers every published
//! [`CollabEvent`] through the hub. Draining a single subscription keeps
//! delivery FIFO per channel; no ordering holds across channels.

use std::sync::Arc;

use tokio::sync::broadcast;

use cowrite_events::CollabEvent;

use crate::ws::ConnectionHub;

/// Run the fan-out loop.
///
/// Subscribes to the event bus via `receiver` and broadcasts each event to
/// its channel's connections. The loop exits when the channel is closed
/// (i.e. the [`EventBus`](cowrite_events::EventBus) is dropped).
pub async fn run(hub: Arc<ConnectionHub>, mut receiver: broadcast::Receiver<CollabEvent>) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                let delivered = hub.broadcast(&event).await;
                tracing::trace!(
                    channel = %event.channel,
                    event_type = %event.event_type,
                    delivered,
                    "Event fanned out"
                );
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Event fan-out lagged, events were dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("Event bus closed, fan-out shutting down");
                break;
            }
        }
    }
}
