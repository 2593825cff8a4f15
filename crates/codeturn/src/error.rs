//! Unified error type for the Codeturn server.

use codeturn_eval::EvalError;
use codeturn_players::RegistryError;
use codeturn_protocol::ProtocolError;
use codeturn_room::{CatalogError, RoomError};
use codeturn_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CodeturnError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame that couldn't be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Creating, joining, or leaving a room failed.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The level catalog is missing or invalid.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use codeturn_protocol::PlayerId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::FrameTooLarge { size: 300, limit: 256 };
        let err: CodeturnError = err.into();
        assert!(matches!(err, CodeturnError::Transport(_)));
        assert!(err.to_string().contains("exceeds limit of 256"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: CodeturnError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, CodeturnError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error_keeps_player_facing_text() {
        let err: CodeturnError = RoomError::NotFound("lounge".into()).into();
        assert!(matches!(err, CodeturnError::Room(_)));
        assert_eq!(err.to_string(), "room 'lounge' not found");
    }

    #[test]
    fn test_from_registry_error() {
        let err: CodeturnError = RegistryError::NotFound(PlayerId(3)).into();
        assert!(matches!(err, CodeturnError::Registry(_)));
    }

    #[test]
    fn test_from_config_error() {
        let err: CodeturnError = ConfigError::Invalid("eval.interpreter must be set".into()).into();
        assert!(matches!(err, CodeturnError::Config(_)));
    }
}
