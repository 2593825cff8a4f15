//! Error types for the room layer.

use std::path::PathBuf;

use codeturn_protocol::PlayerId;

/// Errors from room management (creating, joining, leaving rooms).
///
/// The `Display` text of the join-related variants is sent to clients as
/// an `actionError`, so it is phrased for players.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this name exists.
    #[error("room '{0}' not found")]
    NotFound(String),

    /// Room names are unique.
    #[error("a room named '{0}' already exists")]
    NameTaken(String),

    #[error("invalid room name: {0}")]
    InvalidName(String),

    #[error("invalid room options: {0}")]
    InvalidOptions(String),

    /// The room has a password and it didn't match.
    #[error("wrong password")]
    WrongPassword,

    /// The server already runs as many rooms as it allows.
    #[error("too many rooms (limit {0}), try again later")]
    TooManyRooms(usize),

    /// No more player slots available.
    #[error("room '{0}' is full")]
    RoomFull(String),

    /// A player is in at most one room at a time.
    #[error("player {0} is already in a room")]
    AlreadyInRoom(PlayerId),

    #[error("player {0} is not in any room")]
    NotInRoom(PlayerId),

    /// The session refused the join (e.g. an invalid nickname).
    #[error("{0}")]
    Rejected(String),

    /// The room's actor has stopped or its channel is closed.
    #[error("room '{0}' is unavailable")]
    Unavailable(String),
}

/// A rejected in-session action.
///
/// Session state is unchanged when one of these is returned. The
/// `Display` text is exactly what the client receives in
/// `actionError{message}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// Bad or missing input, or the action isn't legal in this phase.
    #[error("{0}")]
    Validation(String),

    /// The sender isn't allowed to do this (not their turn, not host).
    #[error("{0}")]
    Authorization(String),
}

impl ActionError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }
}

/// Errors loading or validating the level catalog. All of these are
/// fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read level catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed level catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("level catalog contains no levels")]
    Empty,

    #[error("duplicate level id {0}")]
    DuplicateId(u32),

    #[error("level {id} is invalid: {reason}")]
    InvalidLevel { id: u32, reason: String },
}
