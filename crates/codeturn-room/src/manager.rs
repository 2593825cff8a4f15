//! Room manager: creates, tracks, and routes players to named rooms.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use codeturn_eval::{Evaluator, ScoreRules};
use codeturn_protocol::{PlayerId, RoomListEntry};
use tokio::time::Instant;

use crate::room::spawn_room;
use crate::{LevelCatalog, PlayerSender, RoomConfig, RoomError, RoomHandle};

/// Longest accepted room name, in characters.
pub const MAX_ROOM_NAME_CHARS: usize = 32;

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Default limit on live rooms per server.
pub const DEFAULT_MAX_ROOMS: usize = 256;

/// How long a room may sit with nobody in it before it is dropped.
pub const DEFAULT_EMPTY_ROOM_GRACE: Duration = Duration::from_secs(60);

/// Per-room settings chosen at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomOptions {
    /// Required to join when set. An empty string means no password.
    pub password: Option<String>,
    /// Turn length override, in seconds.
    pub turn_secs: Option<u64>,
}

struct RoomEntry {
    handle: RoomHandle,
    password: Option<String>,
    created: Instant,
}

/// A room's handle plus what the manager knows about it, cloned out so
/// listing can query actors without holding the manager.
#[derive(Clone)]
pub struct ListedRoom {
    pub handle: RoomHandle,
    pub has_password: bool,
}

/// Manages all live rooms and tracks which player is in which room.
///
/// A player is in at most one room at a time. A room is destroyed, and
/// its actor stopped, when its last player leaves. Rooms nobody ever
/// joins are dropped once they have been empty for the grace period.
pub struct RoomManager<E: Evaluator> {
    rooms: HashMap<String, RoomEntry>,
    player_rooms: HashMap<PlayerId, String>,
    config: RoomConfig,
    catalog: Arc<LevelCatalog>,
    evaluator: Arc<E>,
    score_rules: ScoreRules,
    /// Joining this name creates the room on demand.
    default_room: Option<String>,
    max_rooms: usize,
    empty_room_grace: Duration,
}

impl<E: Evaluator> RoomManager<E> {
    pub fn new(
        config: RoomConfig,
        catalog: Arc<LevelCatalog>,
        evaluator: Arc<E>,
        score_rules: ScoreRules,
    ) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            config,
            catalog,
            evaluator,
            score_rules,
            default_room: None,
            max_rooms: DEFAULT_MAX_ROOMS,
            empty_room_grace: DEFAULT_EMPTY_ROOM_GRACE,
        }
    }

    /// Cap the number of live rooms. Creating past it fails with
    /// [`RoomError::TooManyRooms`].
    pub fn with_max_rooms(mut self, max_rooms: usize) -> Self {
        self.max_rooms = max_rooms;
        self
    }

    /// How long an unjoined room survives before it is reaped.
    pub fn with_empty_room_grace(mut self, grace: Duration) -> Self {
        self.empty_room_grace = grace;
        self
    }

    /// Let players join `name` without creating it first.
    pub fn with_default_room(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.default_room = (!name.trim().is_empty()).then(|| name.trim().to_string());
        self
    }

    pub fn default_room(&self) -> Option<&str> {
        self.default_room.as_deref()
    }

    /// Creates a room and returns its (trimmed) name.
    ///
    /// # Errors
    /// `InvalidName` for empty, overlong, or control-character names,
    /// `NameTaken` if a room with this name exists, `InvalidOptions`
    /// for a zero turn time, and `TooManyRooms` at the room cap.
    pub fn create_room(&mut self, name: &str, options: RoomOptions) -> Result<String, RoomError> {
        let name = validate_room_name(name)?;
        self.reap_empty_rooms();
        if self.rooms.contains_key(&name) {
            return Err(RoomError::NameTaken(name));
        }
        if self.rooms.len() >= self.max_rooms {
            tracing::warn!(room = %name, limit = self.max_rooms, "room limit reached");
            return Err(RoomError::TooManyRooms(self.max_rooms));
        }

        let mut config = self.config.clone();
        if let Some(turn_secs) = options.turn_secs {
            if turn_secs == 0 {
                return Err(RoomError::InvalidOptions(
                    "turn time must be at least 1 second".into(),
                ));
            }
            config.turn_secs = turn_secs;
        }
        let password = options.password.filter(|p| !p.is_empty());

        let handle = spawn_room(
            &name,
            config,
            Arc::clone(&self.catalog),
            self.score_rules,
            Arc::clone(&self.evaluator),
            DEFAULT_CHANNEL_SIZE,
        );
        tracing::info!(room = %name, has_password = password.is_some(), "room created");
        self.rooms.insert(
            name.clone(),
            RoomEntry {
                handle,
                password,
                created: Instant::now(),
            },
        );
        Ok(name)
    }

    /// Adds a player to a named room and returns a handle for routing
    /// their actions.
    pub async fn join_room(
        &mut self,
        player_id: PlayerId,
        name: &str,
        password: Option<&str>,
        nickname: Option<String>,
        sender: PlayerSender,
    ) -> Result<RoomHandle, RoomError> {
        if self.player_rooms.contains_key(&player_id) {
            return Err(RoomError::AlreadyInRoom(player_id));
        }
        let name = name.trim();
        if !self.rooms.contains_key(name) && self.default_room.as_deref() == Some(name) {
            self.create_room(name, RoomOptions::default())?;
        }

        let entry = self
            .rooms
            .get(name)
            .ok_or_else(|| RoomError::NotFound(name.to_string()))?;
        if let Some(expected) = &entry.password {
            if password != Some(expected.as_str()) {
                tracing::debug!(room = %name, %player_id, "wrong room password");
                return Err(RoomError::WrongPassword);
            }
        }

        let handle = entry.handle.clone();
        match handle.join(player_id, nickname, sender).await {
            Ok(()) => {
                self.player_rooms.insert(player_id, name.to_string());
                Ok(handle)
            }
            Err(RoomError::Unavailable(room)) => {
                tracing::warn!(%room, "dropping room whose actor has stopped");
                self.rooms.remove(&room);
                Err(RoomError::Unavailable(room))
            }
            Err(e) => Err(e),
        }
    }

    /// Removes a player from their current room, destroying the room if
    /// they were the last one in it.
    pub async fn leave_room(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        let name = self
            .player_rooms
            .remove(&player_id)
            .ok_or(RoomError::NotInRoom(player_id))?;

        let Some(entry) = self.rooms.get(&name) else {
            return Ok(());
        };
        let remaining = match entry.handle.leave(player_id).await {
            Ok(remaining) => remaining,
            Err(e) => {
                tracing::warn!(room = %name, %player_id, error = %e, "leave failed");
                0
            }
        };
        if remaining == 0 {
            self.destroy_room(&name).await?;
        }
        Ok(())
    }

    /// Handles to every live room, after dropping abandoned ones. Pass
    /// them to [`list_rooms`] once the manager is released.
    pub fn room_handles(&mut self) -> Vec<ListedRoom> {
        self.reap_empty_rooms();
        self.rooms
            .values()
            .map(|entry| ListedRoom {
                handle: entry.handle.clone(),
                has_password: entry.password.is_some(),
            })
            .collect()
    }

    /// Drops rooms that nobody is in and that are older than the grace
    /// period. Their actors stop once the last handle is gone.
    fn reap_empty_rooms(&mut self) {
        let grace = self.empty_room_grace;
        let occupied: HashSet<&str> = self.player_rooms.values().map(String::as_str).collect();
        let abandoned: Vec<String> = self
            .rooms
            .iter()
            .filter(|(name, entry)| {
                !occupied.contains(name.as_str()) && entry.created.elapsed() >= grace
            })
            .map(|(name, _)| name.clone())
            .collect();

        for name in abandoned {
            if let Some(entry) = self.rooms.remove(&name) {
                entry.handle.request_shutdown();
                tracing::info!(room = %name, "reaped empty room");
            }
        }
    }

    /// Shuts down a room and removes all its players from the index.
    pub async fn destroy_room(&mut self, name: &str) -> Result<(), RoomError> {
        let entry = self
            .rooms
            .remove(name)
            .ok_or_else(|| RoomError::NotFound(name.to_string()))?;

        let _ = entry.handle.shutdown().await;
        self.player_rooms.retain(|_, room| room.as_str() != name);

        tracing::info!(room = %name, "room destroyed");
        Ok(())
    }

    /// Stops every room. Used on server shutdown.
    pub async fn shutdown_all(&mut self) {
        let names: Vec<String> = self.rooms.keys().cloned().collect();
        for name in names {
            let _ = self.destroy_room(&name).await;
        }
    }

    /// The room a player is currently in, if any.
    pub fn player_room(&self, player_id: PlayerId) -> Option<&str> {
        self.player_rooms.get(&player_id).map(String::as_str)
    }

    pub fn room_handle(&self, name: &str) -> Option<RoomHandle> {
        self.rooms.get(name).map(|entry| entry.handle.clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// Asks each room for its metadata and builds the lobby listing, sorted
/// by name. Rooms that fail to respond (e.g. shutting down) are skipped.
pub async fn list_rooms(rooms: Vec<ListedRoom>) -> Vec<RoomListEntry> {
    let mut entries = Vec::with_capacity(rooms.len());
    for room in &rooms {
        if let Ok(info) = room.handle.get_info().await {
            entries.push(RoomListEntry {
                room_name: info.name,
                game_state: info.phase,
                player_count: info.player_count,
                max_players: info.max_players,
                has_password: room.has_password,
            });
        }
    }
    entries.sort_by(|a, b| a.room_name.cmp(&b.room_name));
    entries
}

fn validate_room_name(raw: &str) -> Result<String, RoomError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RoomError::InvalidName("name cannot be empty".into()));
    }
    let len = name.chars().count();
    if len > MAX_ROOM_NAME_CHARS {
        return Err(RoomError::InvalidName(format!(
            "name is {len} characters, max {MAX_ROOM_NAME_CHARS}"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(RoomError::InvalidName("name contains invalid characters".into()));
    }
    Ok(name.to_string())
}
