//! WebSocket connection handler.
//!
//! Runs one task per connection: parses inbound client events, routes them
//! through the coordinator state, and cleans up on disconnect. All outbound
//! traffic goes through the dispatcher so room broadcasts and direct sends
//! share one path.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::presence::Departure;
use crate::protocol::{ClientEvent, Participant, ServerEvent};
use crate::state::CoordinatorState;

/// Language restored to a joiner when the room has never saved one.
const DEFAULT_LANGUAGE: &str = "javascript";

/// Handle a single WebSocket connection.
///
/// This function runs for the lifetime of the connection:
/// 1. Assigns a connection id and registers the outbound channel
/// 2. Sends the `session-init` handshake carrying the connection id
/// 3. Spawns a sender task to forward outbound events
/// 4. Processes incoming events until the connection closes
/// 5. Releases presence, session, and broadcast-group entries
pub async fn handle_websocket(socket: WebSocket, state: CoordinatorState) {
    let connection_id = Uuid::new_v4().to_string();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Create the outbound channel for this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    // ── Step 1: Register Connection ───────────────────────────────────────

    state.dispatcher.register(&connection_id, tx);
    tracing::info!(connection_id = connection_id.as_str(), "WebSocket connected");

    // ── Step 2: Handshake ─────────────────────────────────────────────────

    // Clients echo this id back in cursor and private-message payloads.
    state.dispatcher.emit_to(
        &connection_id,
        ServerEvent::SessionInit {
            connection_id: connection_id.clone(),
        },
    );

    // ── Step 3: Spawn Sender Task ─────────────────────────────────────────

    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize server event: {}", e);
                }
            }
        }
    });

    // ── Step 4: Process Events ────────────────────────────────────────────

    while let Some(msg_result) = ws_receiver.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    handle_client_event(&state, &connection_id, event).await;
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = connection_id.as_str(),
                        "Failed to parse client event: {}",
                        e
                    );
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    connection_id = connection_id.as_str(),
                    "WebSocket error: {}",
                    e
                );
                break;
            }
        }
    }

    // ── Step 5: Cleanup ───────────────────────────────────────────────────

    handle_disconnect(&state, &connection_id);
    state.dispatcher.unregister(&connection_id);
    sender_task.abort();
    tracing::info!(
        connection_id = connection_id.as_str(),
        "WebSocket disconnected"
    );
}

/// Route a parsed client event. Each arm reads/mutates the relevant stores
/// and asks the dispatcher to emit the resulting events; a failure in one
/// event's handling is logged and never propagates to other connections.
pub async fn handle_client_event(state: &CoordinatorState, connection_id: &str, event: ClientEvent) {
    match event {
        ClientEvent::JoinRoom { room_id, username } => {
            handle_join(state, connection_id, &room_id, &username).await;
        }

        ClientEvent::CodeChange { room_id, content } => {
            // Broadcast includes the sender: the editor treats the echo as
            // confirmation that the server accepted the edit.
            state.dispatcher.emit_to_room(
                &room_id,
                &ServerEvent::UpdateCode {
                    content: content.clone(),
                },
            );
            if let Err(e) = state.documents.upsert_code(&room_id, &content).await {
                tracing::error!(room_id = room_id.as_str(), "Failed to persist code: {}", e);
            }
        }

        ClientEvent::LanguageChange { room_id, language } => {
            state.dispatcher.emit_to_room_except(
                &room_id,
                connection_id,
                &ServerEvent::UpdateLanguage {
                    language: language.clone(),
                },
            );
            if let Err(e) = state.documents.upsert_language(&room_id, &language).await {
                tracing::error!(
                    room_id = room_id.as_str(),
                    "Failed to persist language: {}",
                    e
                );
            }
        }

        ClientEvent::CursorChange {
            room_id,
            cursor,
            user_id,
            username,
        } => {
            state.dispatcher.emit_to_room_except(
                &room_id,
                connection_id,
                &ServerEvent::UserCursorUpdate {
                    cursor,
                    user_id: user_id.unwrap_or_else(|| connection_id.to_string()),
                    username,
                },
            );
        }

        ClientEvent::SwitchTool {
            room_id,
            tool,
            username,
            is_forced,
        } => {
            state.room_state.set_active_tool(&room_id, tool.clone());
            state.dispatcher.emit_to_room_except(
                &room_id,
                connection_id,
                &ServerEvent::ToolSwitched {
                    room_id: room_id.clone(),
                    tool,
                    username,
                    is_forced,
                },
            );
        }

        ClientEvent::SendChatMessage { room_id, message } => {
            // Append is idempotent by id; the broadcast still fires so a
            // redelivered frame reaches clients that missed the first one.
            if !state.chat.append_public(&room_id, message.clone()) {
                tracing::debug!(
                    room_id = room_id.as_str(),
                    message_id = message.id.as_str(),
                    "Duplicate chat message ignored"
                );
            }
            state
                .dispatcher
                .emit_to_room(&room_id, &ServerEvent::PublicMessage(message));
        }

        ClientEvent::SendPrivateMessage { room_id, message } => {
            let Some(recipient_id) = message.recipient_id.clone() else {
                tracing::warn!(
                    room_id = room_id.as_str(),
                    sender_id = message.sender_id.as_str(),
                    "Private message without a recipient dropped"
                );
                return;
            };
            state
                .chat
                .append_private(&room_id, &message.sender_id, &recipient_id, message.clone());
            // No echo to the sender; their client appends locally.
            state
                .dispatcher
                .emit_to(&recipient_id, ServerEvent::PrivateMessageReceived(message));
        }

        ClientEvent::LoadPrivateConversation {
            room_id,
            other_user_id,
        } => {
            let conversation = state
                .chat
                .private_history(&room_id, connection_id, &other_user_id);
            state.dispatcher.emit_to(
                connection_id,
                ServerEvent::PrivateConversationHistory(conversation),
            );
        }

        ClientEvent::LoadPublicMessages { room_id } => {
            let history = state.chat.public_history(&room_id).unwrap_or_default();
            state
                .dispatcher
                .emit_to(connection_id, ServerEvent::PublicMessagesHistory(history));
        }

        ClientEvent::WhiteboardDraw { room_id, data } => {
            if let Some(paths) = &data.paths {
                state.room_state.set_whiteboard_paths(&room_id, paths.clone());
            }
            state.dispatcher.emit_to_room_except(
                &room_id,
                connection_id,
                &ServerEvent::WhiteboardUpdate {
                    paths: data.paths.unwrap_or_default(),
                },
            );
        }

        ClientEvent::WhiteboardClear { room_id } => {
            state.room_state.clear_whiteboard(&room_id);
            state.dispatcher.emit_to_room_except(
                &room_id,
                connection_id,
                &ServerEvent::WhiteboardCleared,
            );
        }

        ClientEvent::WhiteboardJoin { room_id } => {
            // Attaches to the broadcast group only; the connection never
            // appears on the roster. Used by spectating whiteboard views.
            state.dispatcher.join_group(&room_id, connection_id);
            if let Some(paths) = state.room_state.whiteboard_paths(&room_id) {
                state
                    .dispatcher
                    .emit_to(connection_id, ServerEvent::WhiteboardState { paths });
            }
        }

        ClientEvent::GetRoomInfo { room_id } => {
            let current_tool = state
                .room_state
                .active_tool(&room_id)
                .map(|tool| tool.as_str().to_string())
                .unwrap_or_else(|| "none".to_string());
            let tracked_users = state
                .presence
                .participants(&room_id)
                .into_iter()
                .map(|p| p.name)
                .collect();
            state.dispatcher.emit_to(
                connection_id,
                ServerEvent::RoomInfo {
                    // userCount counts the broadcast group, trackedUsers the
                    // roster; whiteboard spectators make them diverge.
                    user_count: state.dispatcher.group_size(&room_id),
                    tracked_users,
                    whiteboard_paths: state.room_state.whiteboard_path_count(&room_id),
                    current_tool,
                    room_id,
                },
            );
        }

        ClientEvent::GetWhiteboardState { room_id } => {
            let snapshot = state.room_state.whiteboard_paths(&room_id);
            state.dispatcher.emit_to(
                connection_id,
                ServerEvent::WhiteboardDebug {
                    has_state: snapshot.is_some(),
                    path_count: snapshot.as_ref().map(|paths| paths.len()).unwrap_or(0),
                    state: snapshot,
                },
            );
        }

        ClientEvent::LeaveRoom { room_id, .. } => {
            handle_leave(state, connection_id, &room_id);
        }
    }
}

/// Join flow.
///
/// Membership mutations are synchronous single-step operations; only the
/// document lookup suspends, so concurrent joins can interleave there but
/// never corrupt the roster.
async fn handle_join(state: &CoordinatorState, connection_id: &str, room_id: &str, username: &str) {
    // Rejoining the same room is a no-op: no roster churn, no announcements.
    if state.presence.is_member(room_id, connection_id) {
        return;
    }

    let document = match state.documents.get_room(room_id).await {
        Ok(Some(document)) => document,
        Ok(None) => {
            state.dispatcher.emit_to(
                connection_id,
                ServerEvent::RoomError {
                    message: "Room not found".to_string(),
                },
            );
            return;
        }
        Err(e) => {
            tracing::error!(room_id = room_id, "Room lookup failed: {}", e);
            state.dispatcher.emit_to(
                connection_id,
                ServerEvent::RoomError {
                    message: "Room lookup failed".to_string(),
                },
            );
            return;
        }
    };

    let display_name = resolve_display_name(username, connection_id);

    // Moving between rooms: depart the old room with full leave semantics
    // before touching the new one.
    for departure in state.presence.remove(connection_id) {
        state
            .dispatcher
            .leave_group(&departure.room_id, connection_id);
        settle_departure(state, &departure);
    }

    let claim = state.sessions.claim(room_id, &display_name, connection_id);
    if let Some(stale_id) = &claim.evicted_connection_id {
        // A refresh of the same identity: silently drop the stale roster
        // entry, no user-left for a participant who never really left.
        state.presence.remove_from(room_id, stale_id);
    }

    state.dispatcher.join_group(room_id, connection_id);

    if let Some(tool) = state.room_state.active_tool(room_id) {
        state.dispatcher.emit_to(
            connection_id,
            ServerEvent::ToolState {
                tool,
                is_forced: true,
            },
        );
    }

    let participant = Participant {
        id: connection_id.to_string(),
        name: display_name.clone(),
    };
    let newly_added = state.presence.join(room_id, participant);

    if newly_added {
        state.dispatcher.emit_to_room(
            room_id,
            &ServerEvent::UsersUpdate(state.presence.participants(room_id)),
        );
    }

    if claim.is_reconnect {
        tracing::info!(
            room_id = room_id,
            username = display_name.as_str(),
            "User reconnected"
        );
    } else {
        state.dispatcher.emit_to_room(
            room_id,
            &ServerEvent::UserJoined {
                username: display_name.clone(),
            },
        );
    }

    state.dispatcher.emit_to(
        connection_id,
        ServerEvent::RestoreState {
            code: document.code.unwrap_or_default(),
            language: document
                .language
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        },
    );

    if let Some(paths) = state.room_state.whiteboard_paths(room_id) {
        state
            .dispatcher
            .emit_to(connection_id, ServerEvent::WhiteboardState { paths });
    }

    if let Some(history) = state.chat.public_history(room_id) {
        state
            .dispatcher
            .emit_to(connection_id, ServerEvent::PublicChatHistory(history));
    }

    tracing::info!(
        room_id = room_id,
        username = display_name.as_str(),
        connection_id = connection_id,
        "User joined room"
    );
}

/// Explicit leave (navigation away, not a dropped connection).
fn handle_leave(state: &CoordinatorState, connection_id: &str, room_id: &str) {
    if let Some(departure) = state.presence.remove_from(room_id, connection_id) {
        state
            .sessions
            .release(room_id, &departure.participant.name);
        settle_departure(state, &departure);
    }
    // Detach from the broadcast group whether or not the connection was
    // tracked (it may only have whiteboard-joined).
    state.dispatcher.leave_group(room_id, connection_id);
}

/// Disconnect cleanup: release every session and presence entry held by the
/// connection, garbage-collecting rooms it leaves empty.
pub fn handle_disconnect(state: &CoordinatorState, connection_id: &str) {
    state.sessions.release_by_connection(connection_id);
    for departure in state.presence.remove(connection_id) {
        settle_departure(state, &departure);
    }
    state.dispatcher.leave_all_groups(connection_id);
}

/// Post-departure bookkeeping shared by leave, disconnect, and room moves:
/// either garbage-collect the now-empty room or notify the remaining members.
fn settle_departure(state: &CoordinatorState, departure: &Departure) {
    if departure.room_now_empty {
        state.room_state.remove(&departure.room_id);
        tracing::debug!(
            room_id = departure.room_id.as_str(),
            "Room empty, ephemeral state dropped"
        );
    } else {
        state.dispatcher.emit_to_room(
            &departure.room_id,
            &ServerEvent::UsersUpdate(state.presence.participants(&departure.room_id)),
        );
        state.dispatcher.emit_to_room(
            &departure.room_id,
            &ServerEvent::UserLeft {
                username: departure.participant.name.clone(),
            },
        );
    }
}

/// Display name with the anonymous fallback: "User " plus the first four
/// characters of the connection id.
fn resolve_display_name(username: &str, connection_id: &str) -> String {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        let prefix: String = connection_id.chars().take(4).collect();
        format!("User {}", prefix)
    } else {
        trimmed.to_string()
    }
}
