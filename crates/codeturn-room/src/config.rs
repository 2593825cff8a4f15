//! Room configuration and the session phase transition table.

use std::time::Duration;

use codeturn_protocol::SessionPhase;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration for one room's session.
///
/// Server-wide defaults come from the `[room]` config table; `createRoom`
/// may override the turn time per room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Length of one turn, in seconds.
    pub turn_secs: u64,

    /// Ready players needed before a game can start. Every connected
    /// non-spectator must also be ready.
    pub min_ready_players: usize,

    /// Maximum players (spectators included) in the room.
    pub max_players: usize,

    /// Pause after a level is solved (and after the last one, before the
    /// return to the lobby), in seconds.
    pub level_complete_delay_secs: u64,

    /// Largest shared buffer accepted, in bytes.
    pub max_code_bytes: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            turn_secs: 60,
            min_ready_players: 2,
            max_players: 8,
            level_complete_delay_secs: 3,
            max_code_bytes: 64 * 1024,
        }
    }
}

impl RoomConfig {
    pub fn turn_time(&self) -> Duration {
        Duration::from_secs(self.turn_secs)
    }

    pub fn level_complete_delay(&self) -> Duration {
        Duration::from_secs(self.level_complete_delay_secs)
    }
}

// ---------------------------------------------------------------------------
// Phase transitions
// ---------------------------------------------------------------------------

/// Returns `true` if the session may move from `from` to `to`.
///
/// ```text
/// LOBBY → PLAYING → LEVEL_COMPLETE → PLAYING → … → GAME_OVER → LOBBY
///                 ↘ GAME_OVER
/// any non-LOBBY phase → LOBBY (host reset, safety valve)
/// ```
pub fn can_transition(from: SessionPhase, to: SessionPhase) -> bool {
    use SessionPhase::*;
    matches!(
        (from, to),
        (Lobby, Playing)
            | (Playing, LevelComplete)
            | (Playing, GameOver)
            | (LevelComplete, Playing)
            | (Playing | LevelComplete | GameOver, Lobby)
    )
}
