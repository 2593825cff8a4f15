//! Core protocol types for Codeturn's wire format.
//!
//! Every inbound and outbound event is one JSON object per WebSocket text
//! frame, tagged by its `event` name:
//!
//! ```text
//! { "event": "codeUpdate", "code": "def test(a, b):\n    return a + b" }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LevelView;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A connection-scoped player identifier.
///
/// A player exists for exactly as long as its connection; reconnecting
/// yields a new id. `#[serde(transparent)]` puts the bare number on the
/// wire, so `PlayerId(42)` is just `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive a message?
// ---------------------------------------------------------------------------

/// Specifies who in a session should receive a server event.
///
/// The session state machine returns `(Recipient, ServerEvent)` pairs and
/// the room actor fans them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every player in the session.
    All,

    /// One specific player.
    Player(PlayerId),

    /// Everyone except the given player (e.g. code deltas, which the
    /// author already has).
    AllExcept(PlayerId),
}

// ---------------------------------------------------------------------------
// Session phase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a session.
///
/// ```text
/// LOBBY → PLAYING → LEVEL_COMPLETE → PLAYING → … → GAME_OVER → LOBBY
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    Lobby,
    Playing,
    LevelComplete,
    GameOver,
}

impl SessionPhase {
    /// Returns `true` while a round is being played (new joiners become
    /// spectators).
    pub fn is_round_active(&self) -> bool {
        matches!(self, Self::Playing | Self::LevelComplete)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "LOBBY"),
            Self::Playing => write!(f, "PLAYING"),
            Self::LevelComplete => write!(f, "LEVEL_COMPLETE"),
            Self::GameOver => write!(f, "GAME_OVER"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Events a client can send.
///
/// The first group (`createRoom`, `listRooms`, `joinRoom`) is handled by the
/// connection handler before the player belongs to a session; the rest are
/// routed to the player's room actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Create a named room. The creator still has to `joinRoom` it.
    CreateRoom {
        room_name: String,
        password: Option<String>,
        /// Per-room turn length in seconds.
        turn_time: Option<u64>,
    },

    /// List rooms that exist right now.
    ListRooms,

    /// Join a named room, optionally choosing a nickname up front.
    #[serde(alias = "joinRoomSocket")]
    JoinRoom {
        #[serde(alias = "name")]
        room_name: String,
        password: Option<String>,
        player_name: Option<String>,
    },

    SetNickname { nickname: String },
    ToggleReady,
    CodeUpdate { code: String },
    PassTurn,
    /// Host only: reset the shared buffer and the level clock.
    ResetLevel,
    /// Host only: abandon the round and go back to the lobby.
    ForceResetToLobby,
    /// Host only: remove another player from the session.
    KickPlayer { target_id: PlayerId },
    SubmitCode,
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// A summary of a room returned by `listRooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListEntry {
    pub room_name: String,
    pub game_state: SessionPhase,
    pub player_count: usize,
    pub max_players: usize,
    pub has_password: bool,
}

/// One participant as shown in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub nickname: String,
    pub is_ready: bool,
    pub is_spectator: bool,
    pub is_host: bool,
}

/// Full session snapshot, sent as `gameStateUpdate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub game_state: SessionPhase,
    /// Players in connection order.
    pub players: Vec<PlayerView>,
    pub host_id: Option<PlayerId>,
    pub active_turn_order: Vec<PlayerId>,
    pub current_turn_index: usize,
    pub current_level: Option<LevelView>,
    pub current_code: String,
    pub chosen_input: Option<Vec<Value>>,
    pub chosen_expected_output: Option<Value>,
    pub turn_timer_remaining: Option<u64>,
}

/// Severity of a `feedback` toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    RoomCreated { room_name: String },
    RoomList { rooms: Vec<RoomListEntry> },
    RoomJoined { room_name: String },

    /// Tells a freshly joined client who it is.
    YourInfo { id: PlayerId, nickname: String },

    GameStateUpdate(GameStateView),

    TurnUpdate { player_id: PlayerId, nickname: String },
    TurnTimerUpdate { seconds_remaining: u64 },

    /// Shared-buffer delta, sent to everyone but the author.
    CodeUpdate { code: String },

    SubmissionResult {
        success: bool,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level_id: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        score: Option<u64>,
    },

    GameComplete { message: String },

    Feedback {
        #[serde(rename = "type")]
        kind: FeedbackKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        message: String,
    },

    /// A rejected client action (validation or authorization failure).
    ActionError { message: String },

    /// Sent right before the server closes a kicked player's connection.
    Kicked { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // =====================================================================
    // PlayerId
    // =====================================================================

    #[test]
    fn test_player_id_serializes_as_bare_number() {
        assert_eq!(serde_json::to_value(PlayerId(7)).unwrap(), json!(7));
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    // =====================================================================
    // ClientEvent
    // =====================================================================

    #[test]
    fn test_client_event_join_room_accepts_socket_alias_and_name_field() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "joinRoomSocket",
            "name": "lounge",
            "password": "pw"
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                room_name: "lounge".into(),
                password: Some("pw".into()),
                player_name: None,
            }
        );
    }

    #[test]
    fn test_client_event_join_room_camel_case_fields() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "joinRoom",
            "roomName": "lounge",
            "playerName": "ada"
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                room_name: "lounge".into(),
                password: None,
                player_name: Some("ada".into()),
            }
        );
    }

    #[test]
    fn test_client_event_unit_variants_decode_without_payload() {
        for (name, expected) in [
            ("toggleReady", ClientEvent::ToggleReady),
            ("passTurn", ClientEvent::PassTurn),
            ("resetLevel", ClientEvent::ResetLevel),
            ("forceResetToLobby", ClientEvent::ForceResetToLobby),
            ("submitCode", ClientEvent::SubmitCode),
            ("listRooms", ClientEvent::ListRooms),
        ] {
            let event: ClientEvent = serde_json::from_value(json!({ "event": name })).unwrap();
            assert_eq!(event, expected);
        }
    }

    #[test]
    fn test_client_event_kick_player_target_id() {
        let event: ClientEvent =
            serde_json::from_value(json!({ "event": "kickPlayer", "targetId": 12 })).unwrap();
        assert_eq!(event, ClientEvent::KickPlayer { target_id: PlayerId(12) });
    }

    #[test]
    fn test_client_event_unknown_event_is_rejected() {
        let result: Result<ClientEvent, _> =
            serde_json::from_value(json!({ "event": "flyToMoon" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_client_event_missing_required_field_is_rejected() {
        let result: Result<ClientEvent, _> =
            serde_json::from_value(json!({ "event": "setNickname" }));
        assert!(result.is_err());
    }

    // =====================================================================
    // ServerEvent
    // =====================================================================

    #[test]
    fn test_server_event_feedback_uses_type_field() {
        let event = ServerEvent::Feedback {
            kind: FeedbackKind::Warning,
            title: Some("Back to lobby".into()),
            message: "not enough players".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "feedback");
        assert_eq!(value["type"], "warning");
        assert_eq!(value["title"], "Back to lobby");
    }

    #[test]
    fn test_server_event_game_state_update_is_flattened() {
        let event = ServerEvent::GameStateUpdate(GameStateView {
            game_state: SessionPhase::LevelComplete,
            players: vec![PlayerView {
                id: PlayerId(1),
                nickname: "ada".into(),
                is_ready: true,
                is_spectator: false,
                is_host: true,
            }],
            host_id: Some(PlayerId(1)),
            active_turn_order: vec![PlayerId(1)],
            current_turn_index: 0,
            current_level: None,
            current_code: String::new(),
            chosen_input: Some(vec![json!(1), json!("a")]),
            chosen_expected_output: Some(json!(2)),
            turn_timer_remaining: None,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "gameStateUpdate");
        assert_eq!(value["gameState"], "LEVEL_COMPLETE");
        assert_eq!(value["hostId"], 1);
        assert_eq!(value["players"][0]["isReady"], true);
        assert_eq!(value["chosenInput"], json!([1, "a"]));
    }

    #[test]
    fn test_server_event_submission_result_omits_absent_score() {
        let event = ServerEvent::SubmissionResult {
            success: false,
            message: "wrong".into(),
            level_id: None,
            score: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "submissionResult");
        assert!(value.get("score").is_none());
        assert!(value.get("levelId").is_none());
    }

    #[test]
    fn test_server_event_turn_timer_update_field_name() {
        let value =
            serde_json::to_value(ServerEvent::TurnTimerUpdate { seconds_remaining: 9 }).unwrap();
        assert_eq!(value, json!({ "event": "turnTimerUpdate", "secondsRemaining": 9 }));
    }

    // =====================================================================
    // SessionPhase
    // =====================================================================

    #[test]
    fn test_session_phase_round_activity() {
        assert!(!SessionPhase::Lobby.is_round_active());
        assert!(SessionPhase::Playing.is_round_active());
        assert!(SessionPhase::LevelComplete.is_round_active());
        assert!(!SessionPhase::GameOver.is_round_active());
        assert_eq!(SessionPhase::GameOver.to_string(), "GAME_OVER");
    }
}
