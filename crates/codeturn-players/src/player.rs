//! The player record and nickname rules.

use codeturn_protocol::{PlayerId, PlayerView};
use rand::Rng;

use crate::RegistryError;

/// Longest nickname accepted, in characters (not bytes).
pub const MAX_NICKNAME_CHARS: usize = 20;

/// One connected participant.
///
/// Created when a connection joins a session and dropped when it leaves.
/// Other components refer to players by [`PlayerId`] only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub is_ready: bool,
    /// Joined mid-round; excluded from the turn order until the next level.
    pub is_spectator: bool,
}

impl Player {
    pub fn new(id: PlayerId, nickname: String, is_spectator: bool) -> Self {
        Self {
            id,
            nickname,
            is_ready: false,
            is_spectator,
        }
    }

    /// The client-facing view of this player.
    pub fn view(&self, is_host: bool) -> PlayerView {
        PlayerView {
            id: self.id,
            nickname: self.nickname.clone(),
            is_ready: self.is_ready,
            is_spectator: self.is_spectator,
            is_host,
        }
    }
}

/// Trim and check a requested nickname.
///
/// # Errors
/// - [`RegistryError::EmptyNickname`]: nothing left after trimming
/// - [`RegistryError::NicknameTooLong`]: more than [`MAX_NICKNAME_CHARS`]
/// - [`RegistryError::InvalidNickname`]: contains control characters
pub fn validate_nickname(raw: &str) -> Result<String, RegistryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::EmptyNickname);
    }
    let len = trimmed.chars().count();
    if len > MAX_NICKNAME_CHARS {
        return Err(RegistryError::NicknameTooLong {
            len,
            max: MAX_NICKNAME_CHARS,
        });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(RegistryError::InvalidNickname);
    }
    Ok(trimmed.to_string())
}

const ADJECTIVES: &[&str] = &[
    "Swift", "Clever", "Quiet", "Brave", "Lucky", "Nimble", "Sunny", "Witty",
    "Bold", "Calm", "Eager", "Fuzzy", "Gentle", "Jolly", "Mighty", "Rapid",
];

const ANIMALS: &[&str] = &[
    "Otter", "Falcon", "Panda", "Koala", "Lynx", "Badger", "Heron", "Gecko",
    "Moose", "Raven", "Tiger", "Walrus", "Ferret", "Bison", "Crane", "Yak",
];

/// A random nickname like `SwiftOtter42`. Always fits in
/// [`MAX_NICKNAME_CHARS`].
///
/// Collisions are allowed; players are told apart by id.
pub fn generate_nickname() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let animal = ANIMALS[rng.random_range(0..ANIMALS.len())];
    let number: u8 = rng.random_range(10..100);
    format!("{adjective}{animal}{number}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_nickname_trims_whitespace() {
        assert_eq!(validate_nickname("  ada  ").unwrap(), "ada");
    }

    #[test]
    fn test_validate_nickname_blank_is_rejected() {
        assert_eq!(validate_nickname("   "), Err(RegistryError::EmptyNickname));
    }

    #[test]
    fn test_validate_nickname_counts_chars_not_bytes() {
        // 20 multi-byte characters is fine.
        let name = "é".repeat(MAX_NICKNAME_CHARS);
        assert!(validate_nickname(&name).is_ok());

        let too_long = "a".repeat(MAX_NICKNAME_CHARS + 1);
        assert_eq!(
            validate_nickname(&too_long),
            Err(RegistryError::NicknameTooLong { len: 21, max: 20 })
        );
    }

    #[test]
    fn test_validate_nickname_control_chars_are_rejected() {
        assert_eq!(
            validate_nickname("bad\u{7}bell"),
            Err(RegistryError::InvalidNickname)
        );
    }

    #[test]
    fn test_generate_nickname_always_valid() {
        for _ in 0..200 {
            let name = generate_nickname();
            assert_eq!(validate_nickname(&name).as_deref(), Ok(name.as_str()));
        }
    }

    #[test]
    fn test_every_word_combination_fits() {
        let longest_adj = ADJECTIVES.iter().map(|w| w.len()).max().unwrap();
        let longest_animal = ANIMALS.iter().map(|w| w.len()).max().unwrap();
        assert!(longest_adj + longest_animal + 2 <= MAX_NICKNAME_CHARS);
    }

    #[test]
    fn test_player_view_carries_flags() {
        let mut player = Player::new(PlayerId(3), "ada".into(), true);
        player.is_ready = true;
        let view = player.view(false);
        assert_eq!(view.id, PlayerId(3));
        assert!(view.is_ready);
        assert!(view.is_spectator);
        assert!(!view.is_host);
    }
}
