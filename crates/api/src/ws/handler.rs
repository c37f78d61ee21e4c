//! WebSocket upgrade handler and inbound message dispatch.
//!
//! One task pair per connection: the pump task forwards queued outbound
//! messages to the sink, the receive loop below dispatches inbound frames.
//! Dispatch is an exhaustive match over the closed [`ClientMessage`] enum.
//!
//! Errors from an operation go back to the originating connection only,
//! never broadcast; operation results likewise come back as direct replies
//! while the matching events fan out to the other subscribers via the bus.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::json;

use cowrite_core::collaboration::{entity_channel, session_channel};
use cowrite_core::protocol::{error_envelope, ClientMessage, ParseError, ServerMessage};
use cowrite_core::types::Id;
use cowrite_events::CollabEvent;

use crate::collab::ApplyChangeInput;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// The external authentication step has already run by the time the
/// upgrade happens: [`AuthUser`] validated the token, so the engine only
/// ever sees a trusted user id.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    auth: AuthUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, auth.user_id))
}

/// Manage a single WebSocket connection after upgrade.
async fn handle_socket(socket: WebSocket, state: AppState, user_id: Id) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id = %user_id, "WebSocket connected");

    // Register and get the receiver for outbound messages.
    let mut rx = state.hub.connect(conn_id.clone(), user_id, None).await;
    if let Err(e) = state.presence.set_online(user_id, &conn_id).await {
        tracing::error!(error = %e, user_id = %user_id, "Failed to mark user online");
    }

    let (mut sink, mut stream) = socket.split();

    // Pump task: forward queued messages to the WebSocket sink.
    let pump_conn_id = conn_id.clone();
    let pump_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %pump_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receive loop: dispatch inbound frames.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_frame(&state, &conn_id, user_id, text.as_str()).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                // Heartbeat reply doubles as a presence liveness signal.
                let _ = state.presence.heartbeat(user_id).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: deregister, and when this was the user's last connection,
    // flip presence and auto-release their locks.
    if let Some(info) = state.hub.disconnect(&conn_id).await {
        if info.last_connection {
            if let Err(e) = state.presence.set_offline(user_id).await {
                tracing::error!(error = %e, user_id = %user_id, "Failed to mark user offline");
            }
            if let Err(e) = state.locks.release_on_disconnect(user_id).await {
                tracing::error!(error = %e, user_id = %user_id, "Failed to auto-release locks");
            }
        }
    }
    pump_task.abort();
    tracing::info!(conn_id = %conn_id, user_id = %user_id, "WebSocket disconnected");
}

/// Parse one inbound frame and dispatch it, answering the sender with an
/// error envelope on failure.
async fn handle_frame(state: &AppState, conn_id: &str, user_id: Id, raw: &str) {
    let message = match ClientMessage::parse(raw) {
        Ok(message) => message,
        Err(ParseError::UnknownType(t)) => {
            state
                .hub
                .send_json(conn_id, &error_envelope(format!("Unknown event type: {t}")))
                .await;
            return;
        }
        Err(ParseError::Malformed(e)) => {
            state
                .hub
                .send_json(conn_id, &error_envelope(format!("Invalid message: {e}")))
                .await;
            return;
        }
    };

    if let Err(e) = dispatch(state, conn_id, user_id, message).await {
        tracing::debug!(conn_id = %conn_id, error = %e, "Inbound operation failed");
        state
            .hub
            .send_json(conn_id, &error_envelope(e.to_string()))
            .await;
    }
}

/// Route one inbound message to the owning service.
async fn dispatch(
    state: &AppState,
    conn_id: &str,
    user_id: Id,
    message: ClientMessage,
) -> Result<(), AppError> {
    match message {
        ClientMessage::Subscribe { channel } => {
            state.hub.subscribe(conn_id, &channel).await;
        }
        ClientMessage::Unsubscribe { channel } => {
            state.hub.unsubscribe(conn_id, &channel).await;
        }

        ClientMessage::PresenceUpdate {
            status,
            status_message,
        } => {
            state
                .presence
                .update_status(user_id, &status, status_message.as_deref())
                .await?;
        }
        ClientMessage::PresenceLocation {
            page,
            entity_type,
            entity_id,
        } => {
            state
                .presence
                .update_location(user_id, page.as_deref(), entity_type.as_deref(), entity_id)
                .await?;
        }
        ClientMessage::TypingStart { field } => {
            state.presence.start_typing(user_id, &field).await?;
        }
        ClientMessage::TypingStop => {
            state.presence.stop_typing(user_id).await?;
        }

        ClientMessage::SessionJoin {
            entity_type,
            entity_id,
            role,
        } => {
            let (session, _) = state
                .sessions
                .get_or_create(&entity_type, entity_id, user_id, &Default::default())
                .await?;
            let (session, participant) = state
                .sessions
                .join(session.id, user_id, role.as_deref())
                .await?;

            // Session events and entity-scoped events (locks, typing,
            // version announcements) both matter to a participant.
            state
                .hub
                .subscribe(conn_id, &session_channel(session.id))
                .await;
            state
                .hub
                .subscribe(conn_id, &entity_channel(&entity_type, entity_id))
                .await;

            let reply = ServerMessage::new(
                "session:participant_joined",
                json!({ "session": session, "participant": participant }),
                chrono::Utc::now(),
            )
            .with_channel(session_channel(session.id));
            state
                .hub
                .send_json(conn_id, &serde_json::to_value(&reply).unwrap_or_default())
                .await;
        }
        ClientMessage::SessionLeave { session_id } => {
            state.sessions.leave(session_id, user_id).await?;
            state
                .hub
                .unsubscribe(conn_id, &session_channel(session_id))
                .await;
        }

        ClientMessage::CursorMove { session_id, cursor } => {
            state
                .sessions
                .update_cursor(session_id, user_id, cursor)
                .await?;
            let _ = state.presence.heartbeat(user_id).await;
        }
        ClientMessage::SelectionChange {
            session_id,
            selection,
        } => {
            state
                .sessions
                .update_selection(session_id, user_id, selection)
                .await?;
        }

        ClientMessage::ChangeApply {
            session_id,
            field_path,
            change_type,
            old_value,
            new_value,
            position,
            length,
            base_version,
        } => {
            let outcome = state
                .coordinator
                .apply_change(
                    session_id,
                    user_id,
                    ApplyChangeInput {
                        field_path,
                        change_type,
                        old_value,
                        new_value,
                        position,
                        length,
                        base_version,
                    },
                )
                .await?;

            let event_type = if outcome.conflict.is_some() {
                "change:conflict_resolved"
            } else {
                "change:applied"
            };
            let payload = json!({
                "change": outcome.change,
                "conflict": outcome.conflict,
                "resolved_value": outcome.resolved_value,
                "version": outcome.version.version,
            });

            // Fan out to the other session participants.
            state.bus.publish(
                CollabEvent::new(
                    session_channel(session_id),
                    event_type,
                    payload.clone(),
                )
                .with_sender(user_id),
            );
            state.bus.publish(
                CollabEvent::new(
                    entity_channel(&outcome.session.entity_type, outcome.session.entity_id),
                    "entity:version_created",
                    json!({
                        "entity_type": outcome.session.entity_type,
                        "entity_id": outcome.session.entity_id,
                        "version": outcome.version.version,
                    }),
                )
                .with_sender(user_id),
            );

            // Direct reply so the author can reconcile the local buffer
            // (carries the merged value on a resolved conflict).
            let reply = ServerMessage::new(event_type, payload, chrono::Utc::now())
                .with_channel(session_channel(session_id))
                .with_sender(user_id);
            state
                .hub
                .send_json(conn_id, &serde_json::to_value(&reply).unwrap_or_default())
                .await;
        }
    }

    Ok(())
}
