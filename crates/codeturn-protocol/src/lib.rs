//! Wire protocol for Codeturn.
//!
//! This crate defines the "language" that browser clients and the session
//! server speak:
//!
//! - **Identity** ([`PlayerId`]): the connection-scoped player id.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): the named events that
//!   travel on the wire, one JSON object per WebSocket text frame.
//! - **Levels** ([`Level`], [`ExpectedType`]): the level records read from
//!   the catalog and the trimmed [`LevelView`] clients get to see.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events are converted
//!   to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (ClientEvent) → Room actor (SessionAction)
//! ```

mod codec;
mod error;
mod level;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use level::{ExpectedType, Level, LevelView, TestInput};
pub use types::{
    ClientEvent, FeedbackKind, GameStateView, PlayerId, PlayerView,
    Recipient, RoomListEntry, ServerEvent, SessionPhase,
};
