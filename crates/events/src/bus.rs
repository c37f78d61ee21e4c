//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`CollabEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use cowrite_core::types::Id;

// ---------------------------------------------------------------------------
// CollabEvent
// ---------------------------------------------------------------------------

/// A collaboration event to fan out to connected clients.
///
/// Constructed via [`CollabEvent::new`] and enriched with the builder
/// methods [`with_sender`](CollabEvent::with_sender),
/// [`to_users`](CollabEvent::to_users), and
/// [`include_sender`](CollabEvent::include_sender).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollabEvent {
    /// Broadcast channel, e.g. `session:{id}`, `entity:{type}:{id}`,
    /// `presence:global`.
    pub channel: String,

    /// Colon-separated event name, e.g. `"change:applied"`.
    pub event_type: String,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// The user whose action produced the event.
    pub sender_id: Option<Id>,

    /// When set, delivery is narrowed to these users' connections.
    pub target_user_ids: Option<Vec<Id>>,

    /// Skip every connection registered to the sender. Defaults to true;
    /// presence joins flip it because the acting user needs the local echo.
    pub exclude_sender: bool,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl CollabEvent {
    /// Create an event with the required channel, type, and payload.
    pub fn new(
        channel: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            channel: channel.into(),
            event_type: event_type.into(),
            payload,
            sender_id: None,
            target_user_ids: None,
            exclude_sender: true,
            timestamp: Utc::now(),
        }
    }

    /// Attach the acting user.
    pub fn with_sender(mut self, sender_id: Id) -> Self {
        self.sender_id = Some(sender_id);
        self
    }

    /// Narrow delivery to specific users.
    pub fn to_users(mut self, user_ids: Vec<Id>) -> Self {
        self.target_user_ids = Some(user_ids);
        self
    }

    /// Deliver to the sender's own connections too.
    pub fn include_sender(mut self) -> Self {
        self.exclude_sender = false;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`CollabEvent`]. The single
/// fan-out task draining one subscription preserves publish order per
/// channel.
pub struct EventBus {
    sender: broadcast::Sender<CollabEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: CollabEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<CollabEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let sender = Uuid::new_v4();
        let event = CollabEvent::new(
            "presence:global",
            "presence:joined",
            serde_json::json!({"user_id": sender}),
        )
        .with_sender(sender)
        .include_sender();

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.channel, "presence:global");
        assert_eq!(received.event_type, "presence:joined");
        assert_eq!(received.sender_id, Some(sender));
        assert!(!received.exclude_sender);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(CollabEvent::new("session:x", "session:started", serde_json::json!({})));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event_type, "session:started");
        assert_eq!(e2.event_type, "session:started");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        // No subscribers -- this must not panic.
        bus.publish(CollabEvent::new("session:x", "orphan", serde_json::json!({})));
    }

    #[test]
    fn default_event_excludes_sender() {
        let event = CollabEvent::new("c", "t", serde_json::json!({}));
        assert!(event.exclude_sender);
        assert!(event.sender_id.is_none());
        assert!(event.target_user_ids.is_none());
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        for i in 0..10 {
            bus.publish(CollabEvent::new("c", format!("event:{i}"), serde_json::json!({})));
        }

        for i in 0..10 {
            let e = rx.recv().await.expect("event should arrive");
            assert_eq!(e.event_type, format!("event:{i}"));
        }
    }
}
