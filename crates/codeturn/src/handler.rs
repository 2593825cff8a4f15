//! Per-connection handler: room management events and action routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Spawn a writer task draining the player's outbound channel
//!   2. Loop: receive frames → decode → handle room events locally, route
//!      session events to the player's room actor
//!   3. On exit, leave the room (a drop guard covers panics too)

use std::sync::Arc;

use codeturn_eval::Evaluator;
use codeturn_protocol::{ClientEvent, Codec, PlayerId, ServerEvent};
use codeturn_room::{RoomHandle, RoomOptions, RoomOutbound, SessionAction};
use codeturn_transport::{Accepted, FrameReceiver, FrameSender, TransportError};
use tokio::sync::mpsc;

use crate::CodeturnError;
use crate::server::ServerState;

/// Drop guard that takes a player out of their room when the handler
/// exits.
///
/// `Drop` is synchronous, so the async leave runs in a spawned task.
struct ConnectionGuard<E: Evaluator, C: Codec> {
    player_id: PlayerId,
    state: Arc<ServerState<E, C>>,
}

impl<E: Evaluator, C: Codec> Drop for ConnectionGuard<E, C> {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        runtime.spawn(async move {
            let mut rooms = state.rooms.lock().await;
            if rooms.player_room(player_id).is_some() {
                if let Err(e) = rooms.leave_room(player_id).await {
                    tracing::debug!(%player_id, error = %e, "leave on disconnect failed");
                }
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, R, E, C>(
    conn: Accepted<S, R>,
    state: Arc<ServerState<E, C>>,
) -> Result<(), CodeturnError>
where
    S: FrameSender,
    R: FrameReceiver,
    E: Evaluator,
    C: Codec,
{
    let Accepted {
        id,
        peer,
        sender,
        mut receiver,
    } = conn;
    let player_id = PlayerId(id.into_inner());
    tracing::info!(%player_id, %peer, "player connected");

    let (tx, rx) = mpsc::unbounded_channel();
    let mut writer = tokio::spawn(write_loop(sender, rx, Arc::clone(&state)));
    let _guard = ConnectionGuard {
        player_id,
        state: Arc::clone(&state),
    };

    let mut room: Option<RoomHandle> = None;

    loop {
        let received = tokio::select! {
            received = tokio::time::timeout(state.idle_timeout, receiver.recv_text()) => received,
            _ = &mut writer => {
                tracing::debug!(%player_id, "writer finished, closing reader");
                break;
            }
        };

        let text = match received {
            Ok(Ok(Some(text))) => text,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(TransportError::FrameTooLarge { size, limit })) => {
                tracing::warn!(%player_id, size, limit, "oversize frame rejected");
                reply(&tx, action_error(format!("message too large ({size} bytes, max {limit})")));
                continue;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection idle, closing");
                break;
            }
        };

        let event: ClientEvent = match state.codec.decode(text.as_bytes()) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(%player_id, error = %e, "malformed frame");
                reply(&tx, action_error("malformed message"));
                continue;
            }
        };

        handle_event(&state, player_id, &tx, &mut room, event).await;
    }

    let _ = tx.send(RoomOutbound::Close);
    Ok(())
}

/// Handles one decoded event. Room management events are answered here;
/// everything else goes to the room actor.
async fn handle_event<E: Evaluator, C: Codec>(
    state: &ServerState<E, C>,
    player_id: PlayerId,
    tx: &mpsc::UnboundedSender<RoomOutbound>,
    room: &mut Option<RoomHandle>,
    event: ClientEvent,
) {
    match event {
        ClientEvent::CreateRoom {
            room_name,
            password,
            turn_time,
        } => {
            let options = RoomOptions {
                password,
                turn_secs: turn_time,
            };
            let created = state.rooms.lock().await.create_room(&room_name, options);
            match created {
                Ok(room_name) => reply(tx, ServerEvent::RoomCreated { room_name }),
                Err(e) => reply(tx, action_error(e.to_string())),
            }
        }

        ClientEvent::ListRooms => {
            let handles = state.rooms.lock().await.room_handles();
            let rooms = codeturn_room::list_rooms(handles).await;
            reply(tx, ServerEvent::RoomList { rooms });
        }

        ClientEvent::JoinRoom {
            room_name,
            password,
            player_name,
        } => {
            let joined = state
                .rooms
                .lock()
                .await
                .join_room(
                    player_id,
                    &room_name,
                    password.as_deref(),
                    player_name,
                    tx.clone(),
                )
                .await;
            match joined {
                Ok(handle) => {
                    tracing::info!(%player_id, room = %handle.name(), "player joined room");
                    *room = Some(handle);
                }
                Err(e) => {
                    tracing::debug!(%player_id, room = %room_name, error = %e, "join rejected");
                    reply(tx, action_error(e.to_string()));
                }
            }
        }

        other => {
            let Some(action) = SessionAction::from_client(other) else {
                return;
            };
            let Some(handle) = room.as_ref() else {
                reply(tx, action_error("join a room first"));
                return;
            };
            if let Err(e) = handle.send_action(player_id, action).await {
                tracing::debug!(%player_id, error = %e, "room rejected action");
                reply(tx, action_error(e.to_string()));
            }
        }
    }
}

/// Drains the player's outbound channel onto the socket.
///
/// Ends on [`RoomOutbound::Close`], when every sender is gone, or when
/// the socket stops accepting frames.
async fn write_loop<S, E, C>(
    mut sender: S,
    mut rx: mpsc::UnboundedReceiver<RoomOutbound>,
    state: Arc<ServerState<E, C>>,
) where
    S: FrameSender,
    E: Evaluator,
    C: Codec,
{
    while let Some(outbound) = rx.recv().await {
        match outbound {
            RoomOutbound::Event(event) => {
                let text = match state.codec.encode_text(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode outbound event");
                        continue;
                    }
                };
                if let Err(e) = sender.send_text(text).await {
                    tracing::debug!(error = %e, "send failed, stopping writer");
                    return;
                }
            }
            RoomOutbound::Close => break,
        }
    }
    let _ = sender.close().await;
}

fn reply(tx: &mpsc::UnboundedSender<RoomOutbound>, event: ServerEvent) {
    let _ = tx.send(RoomOutbound::Event(event));
}

fn action_error(message: impl Into<String>) -> ServerEvent {
    ServerEvent::ActionError {
        message: message.into(),
    }
}
