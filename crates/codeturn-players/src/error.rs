//! Error types for the players layer.

use codeturn_protocol::PlayerId;

/// Errors returned by [`PlayerRegistry`](crate::PlayerRegistry) and the
/// nickname helpers.
///
/// The `Display` text of the nickname variants is shown to clients as-is,
/// so keep it human-readable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The id is already registered. Ids are connection-scoped, so this
    /// means a caller tried to add the same connection twice.
    #[error("player {0} is already registered")]
    AlreadyPresent(PlayerId),

    /// No player with this id is connected.
    #[error("player {0} not found")]
    NotFound(PlayerId),

    #[error("nickname cannot be empty")]
    EmptyNickname,

    #[error("nickname is too long ({len} characters, max {max})")]
    NicknameTooLong { len: usize, max: usize },

    #[error("nickname contains invalid characters")]
    InvalidNickname,
}
