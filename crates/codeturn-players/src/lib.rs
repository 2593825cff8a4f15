//! Player bookkeeping for a Codeturn session.
//!
//! This crate answers "who is in this session?":
//!
//! 1. **Registry**: who's connected, in which order ([`PlayerRegistry`])
//! 2. **Host succession**: who holds host privileges after the host leaves
//! 3. **Round flags**: who's ready, who's spectating until the next level
//! 4. **Nicknames**: generated on join, validated on change
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)     ← the session machine owns one registry per room
//!     ↕
//! Players Layer (this)   ← player identity and round flags
//!     ↕
//! Protocol Layer (below) ← provides PlayerId, PlayerView
//! ```

mod error;
mod player;
mod registry;

pub use error::RegistryError;
pub use player::{MAX_NICKNAME_CHARS, Player, generate_nickname, validate_nickname};
pub use registry::{Departure, PlayerRegistry};
