//! Sessions and rooms for Codeturn.
//!
//! Each named room runs as an isolated Tokio task (actor model) that owns
//! one session: the players, the turn rotation, the shared buffer, and
//! the current level.
//!
//! # Key types
//!
//! - [`SessionMachine`]: the pure session state machine
//! - [`TurnOrder`]: the active turn order and current holder
//! - [`LevelCatalog`]: the ordered, validated level list
//! - [`RoomManager`]: creates/destroys rooms, routes players
//! - [`RoomHandle`]: send commands and actions to a running room actor
//! - [`RoomConfig`]: per-room settings (turn time, player limits, ...)

mod catalog;
mod config;
mod error;
mod machine;
mod manager;
mod room;
mod turn;

pub use catalog::LevelCatalog;
pub use config::{RoomConfig, can_transition};
pub use error::{ActionError, CatalogError, RoomError};
pub use machine::{
    Effect, EvaluationJob, EvaluationOutcome, PinnedCase, SessionAction, SessionMachine,
    Transition,
};
pub use manager::{
    DEFAULT_EMPTY_ROOM_GRACE, DEFAULT_MAX_ROOMS, ListedRoom, MAX_ROOM_NAME_CHARS, RoomManager,
    RoomOptions, list_rooms,
};
pub use room::{PlayerSender, RoomHandle, RoomInfo, RoomOutbound};
pub use turn::{TurnOrder, TurnRemoval};
