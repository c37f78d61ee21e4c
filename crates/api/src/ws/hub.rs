//! Connection hub: connection registry, channel membership, and fan-out.
//!
//! The hub owns the only cross-task shared mutable state in the system: the
//! connection → user map, the channel → connection-set map, and the user →
//! connection-set index, all behind one coarse `RwLock`. Reads and writes
//! are short and non-blocking; fan-out snapshots the target senders under
//! the read lock and performs the actual sends after dropping it.
//!
//! Outbound delivery goes through one unbounded mpsc queue per connection,
//! drained by that connection's pump task, so a slow client only delays
//! itself. Within one channel, events reach each subscribed connection in
//! the order they were broadcast.

use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

use cowrite_core::protocol::ServerMessage;
use cowrite_core::types::{Id, Timestamp};
use cowrite_events::CollabEvent;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct Connection {
    /// The already-authenticated user this connection belongs to.
    pub user_id: Id,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// Opaque client info supplied at connect time (user agent, app build).
    pub client_info: Option<Value>,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

/// Result of a [`ConnectionHub::disconnect`] call.
pub struct Disconnected {
    pub user_id: Id,
    /// True when this was the user's last live connection.
    pub last_connection: bool,
    /// The channels the connection was subscribed to.
    pub channels: Vec<String>,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<String, Connection>,
    channels: HashMap<String, HashSet<String>>,
    users: HashMap<Id, HashSet<String>>,
}

/// Manages all active WebSocket connections and their channel subscriptions.
///
/// Thread-safe via an interior `RwLock`; designed to be wrapped in `Arc`
/// and shared across the application — an explicitly-owned instance, not a
/// global singleton.
pub struct ConnectionHub {
    state: RwLock<HubState>,
}

impl ConnectionHub {
    /// Create a new, empty hub.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HubState::default()),
        }
    }

    /// Register a new connection for an authenticated user.
    ///
    /// Returns the receiver half of the message queue so the caller can
    /// pump messages to the WebSocket sink. Re-registering an existing
    /// connection id replaces the previous registration.
    pub async fn connect(
        &self,
        conn_id: String,
        user_id: Id,
        client_info: Option<Value>,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection {
            user_id,
            sender: tx,
            client_info,
            connected_at: chrono::Utc::now(),
        };

        let mut state = self.state.write().await;
        if let Some(previous) = state.connections.insert(conn_id.clone(), conn) {
            Self::forget_connection(&mut state, &conn_id, previous.user_id);
        }
        state.users.entry(user_id).or_default().insert(conn_id);
        rx
    }

    /// Remove a connection from the hub and from every channel it joined.
    ///
    /// Safe to call twice (timeout racing an explicit close): the second
    /// call finds nothing and returns `None`.
    pub async fn disconnect(&self, conn_id: &str) -> Option<Disconnected> {
        let mut state = self.state.write().await;
        let conn = state.connections.remove(conn_id)?;

        let channels: Vec<String> = state
            .channels
            .iter()
            .filter(|(_, members)| members.contains(conn_id))
            .map(|(channel, _)| channel.clone())
            .collect();
        Self::forget_connection(&mut state, conn_id, conn.user_id);

        let last_connection = !state.users.contains_key(&conn.user_id);
        Some(Disconnected {
            user_id: conn.user_id,
            last_connection,
            channels,
        })
    }

    /// Drop a connection id from the channel and user maps.
    fn forget_connection(state: &mut HubState, conn_id: &str, user_id: Id) {
        state.channels.retain(|_, members| {
            members.remove(conn_id);
            !members.is_empty()
        });
        if let Some(conns) = state.users.get_mut(&user_id) {
            conns.remove(conn_id);
            if conns.is_empty() {
                state.users.remove(&user_id);
            }
        }
    }

    /// Add a connection to a channel. Returns `false` for an unknown
    /// connection id instead of erroring.
    pub async fn subscribe(&self, conn_id: &str, channel: &str) -> bool {
        let mut state = self.state.write().await;
        if !state.connections.contains_key(conn_id) {
            return false;
        }
        state
            .channels
            .entry(channel.to_string())
            .or_default()
            .insert(conn_id.to_string());
        true
    }

    /// Remove a connection from a channel. Returns `false` for an unknown
    /// connection id or a channel it never joined.
    pub async fn unsubscribe(&self, conn_id: &str, channel: &str) -> bool {
        let mut state = self.state.write().await;
        if !state.connections.contains_key(conn_id) {
            return false;
        }
        let Some(members) = state.channels.get_mut(channel) else {
            return false;
        };
        let removed = members.remove(conn_id);
        if members.is_empty() {
            state.channels.remove(channel);
        }
        removed
    }

    /// Fan an event out to the subscribers of its channel.
    ///
    /// Delivery rules:
    /// - `exclude_sender` filters by the *registered user id*, so a sender
    ///   with several open connections receives on none of them.
    /// - `target_user_ids`, when set, narrows delivery to those users.
    /// - A closed per-connection queue is skipped (logged, not surfaced);
    ///   one dead socket must not fail delivery to the rest.
    ///
    /// Returns the number of connections the event was queued to.
    pub async fn broadcast(&self, event: &CollabEvent) -> usize {
        let message = Self::encode(event);

        // Snapshot the target senders, then send outside the lock.
        let targets: Vec<(String, WsSender)> = {
            let state = self.state.read().await;
            let Some(members) = state.channels.get(&event.channel) else {
                return 0;
            };
            members
                .iter()
                .filter_map(|conn_id| {
                    let conn = state.connections.get(conn_id)?;
                    if event.exclude_sender && event.sender_id == Some(conn.user_id) {
                        return None;
                    }
                    if let Some(ref allowed) = event.target_user_ids {
                        if !allowed.contains(&conn.user_id) {
                            return None;
                        }
                    }
                    Some((conn_id.clone(), conn.sender.clone()))
                })
                .collect()
        };

        let mut delivered = 0;
        for (conn_id, sender) in targets {
            if sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(conn_id = %conn_id, "Skipped closed connection during broadcast");
            }
        }
        delivered
    }

    /// Send an event to every live connection of one user, independent of
    /// channel subscriptions. Used for personal notifications (lock denied).
    ///
    /// Returns the number of connections the event was queued to.
    pub async fn send_to_user(&self, user_id: Id, event_type: &str, payload: Value) -> usize {
        let envelope = ServerMessage::new(event_type, payload, chrono::Utc::now());
        let message = Self::to_message(&envelope);

        let senders: Vec<WsSender> = {
            let state = self.state.read().await;
            let Some(conn_ids) = state.users.get(&user_id) else {
                return 0;
            };
            conn_ids
                .iter()
                .filter_map(|id| state.connections.get(id).map(|c| c.sender.clone()))
                .collect()
        };

        let mut delivered = 0;
        for sender in senders {
            if sender.send(message.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Send a raw JSON frame to a single connection.
    ///
    /// Used for direct replies to the originating connection (operation
    /// results, error envelopes) — these are returns, not broadcasts.
    /// Returns `false` for an unknown or closed connection.
    pub async fn send_json(&self, conn_id: &str, payload: &Value) -> bool {
        let sender = {
            let state = self.state.read().await;
            match state.connections.get(conn_id) {
                Some(conn) => conn.sender.clone(),
                None => return false,
            }
        };
        let text = match serde_json::to_string(payload) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize reply");
                return false;
            }
        };
        sender.send(Message::Text(text.into())).is_ok()
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Return how many connections are subscribed to a channel.
    pub async fn channel_size(&self, channel: &str) -> usize {
        self.state
            .read()
            .await
            .channels
            .get(channel)
            .map_or(0, HashSet::len)
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let state = self.state.read().await;
        for conn in state.connections.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }

    /// Send a Close frame to every connection, then clear all maps.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut state = self.state.write().await;
        let count = state.connections.len();
        for conn in state.connections.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        state.connections.clear();
        state.channels.clear();
        state.users.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Serialize an event into the outbound envelope frame.
    fn encode(event: &CollabEvent) -> Message {
        let mut envelope = ServerMessage::new(
            event.event_type.clone(),
            event.payload.clone(),
            event.timestamp,
        )
        .with_channel(event.channel.clone());
        if let Some(sender_id) = event.sender_id {
            envelope = envelope.with_sender(sender_id);
        }
        Self::to_message(&envelope)
    }

    fn to_message(envelope: &ServerMessage) -> Message {
        let text = serde_json::to_string(envelope)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {e}"}}"#));
        Message::Text(text.into())
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}
