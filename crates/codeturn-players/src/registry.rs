//! The player registry: who is connected, in what order, and who is host.
//!
//! # Concurrency note
//!
//! `PlayerRegistry` is NOT thread-safe by itself. It is owned by a single
//! room actor and only mutated from that actor's event loop, so plain
//! collections are enough.
//!
//! # Host succession
//!
//! The first player to join becomes host. When the host leaves, the next
//! host is the earliest-joined player still present (scanning
//! ConnectionOrder from the front), never the most recent joiner.
//! Readiness plays no part in it.

use std::collections::HashMap;

use codeturn_protocol::{PlayerId, PlayerView};

use crate::{Player, RegistryError, generate_nickname, validate_nickname};

/// What happened when a player was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// The removed record.
    pub player: Player,
    /// The departing player was the host.
    pub was_host: bool,
    /// Host after the removal. `None` once the registry is empty.
    pub new_host: Option<PlayerId>,
}

/// All players in one session.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<PlayerId, Player>,
    /// Join order of the players still present. Only used for host
    /// succession and for ordering snapshots.
    connection_order: Vec<PlayerId>,
    host: Option<PlayerId>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection.
    ///
    /// `spectator` should be `true` when the session is mid-round. A
    /// nickname is generated when `nickname` is `None`. The first player
    /// in an empty registry becomes host.
    ///
    /// # Errors
    /// - [`RegistryError::AlreadyPresent`] if the id is already registered
    /// - nickname validation errors when a nickname is supplied
    pub fn add_player(
        &mut self,
        id: PlayerId,
        spectator: bool,
        nickname: Option<&str>,
    ) -> Result<&Player, RegistryError> {
        if self.players.contains_key(&id) {
            return Err(RegistryError::AlreadyPresent(id));
        }
        let nickname = match nickname {
            Some(raw) => validate_nickname(raw)?,
            None => generate_nickname(),
        };

        self.connection_order.push(id);
        if self.host.is_none() {
            self.host = Some(id);
            tracing::info!(player_id = %id, "player is now host");
        }
        tracing::debug!(player_id = %id, %nickname, spectator, "player registered");

        Ok(self
            .players
            .entry(id)
            .or_insert(Player::new(id, nickname, spectator)))
    }

    /// Remove a player, promoting a new host if needed.
    ///
    /// # Errors
    /// Returns [`RegistryError::NotFound`] for unknown ids.
    pub fn remove_player(&mut self, id: PlayerId) -> Result<Departure, RegistryError> {
        let player = self
            .players
            .remove(&id)
            .ok_or(RegistryError::NotFound(id))?;
        self.connection_order.retain(|&p| p != id);

        let was_host = self.host == Some(id);
        if was_host {
            self.host = self.promote_next_host();
        }

        tracing::debug!(player_id = %id, was_host, new_host = ?self.host, "player unregistered");

        Ok(Departure {
            player,
            was_host,
            new_host: self.host,
        })
    }

    /// Pick the earliest-joined player still present as host.
    ///
    /// Returns the new host, or `None` if nobody is left.
    pub fn promote_next_host(&mut self) -> Option<PlayerId> {
        let next = self
            .connection_order
            .iter()
            .copied()
            .find(|id| self.players.contains_key(id));
        self.host = next;
        if let Some(host) = next {
            tracing::info!(player_id = %host, "host passed on");
        }
        next
    }

    /// Flip a player's ready flag and return the new value.
    pub fn toggle_ready(&mut self, id: PlayerId) -> Result<bool, RegistryError> {
        let player = self.get_mut(id)?;
        player.is_ready = !player.is_ready;
        Ok(player.is_ready)
    }

    /// Validate and apply a new nickname. Returns the stored (trimmed) form.
    pub fn set_nickname(&mut self, id: PlayerId, raw: &str) -> Result<&str, RegistryError> {
        let nickname = validate_nickname(raw)?;
        let player = self.get_mut(id)?;
        player.nickname = nickname;
        Ok(&player.nickname)
    }

    /// Ready, non-spectator players in connection order. This is the turn
    /// order snapshot taken when a game starts.
    pub fn turn_candidates(&self) -> Vec<PlayerId> {
        self.in_order()
            .filter(|p| p.is_ready && !p.is_spectator)
            .map(|p| p.id)
            .collect()
    }

    /// Admit every spectator at a level boundary: everyone still connected
    /// becomes a ready participant. Returns the ids that were spectating.
    pub fn integrate_spectators(&mut self) -> Vec<PlayerId> {
        let mut integrated = Vec::new();
        for player in self.players.values_mut() {
            if player.is_spectator {
                integrated.push(player.id);
            }
            player.is_spectator = false;
            player.is_ready = true;
        }
        integrated.sort_by_key(|id| self.connection_order.iter().position(|p| p == id));
        integrated
    }

    /// Clear ready and spectator flags so a new round can be negotiated.
    pub fn reset_round_flags(&mut self) {
        for player in self.players.values_mut() {
            player.is_ready = false;
            player.is_spectator = false;
        }
    }

    /// Non-spectators that are ready.
    pub fn ready_count(&self) -> usize {
        self.players
            .values()
            .filter(|p| p.is_ready && !p.is_spectator)
            .count()
    }

    /// `true` if there is at least one non-spectator and all of them are
    /// ready.
    pub fn all_participants_ready(&self) -> bool {
        let mut participants = self.players.values().filter(|p| !p.is_spectator).peekable();
        participants.peek().is_some() && participants.all(|p| p.is_ready)
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    fn get_mut(&mut self, id: PlayerId) -> Result<&mut Player, RegistryError> {
        self.players.get_mut(&id).ok_or(RegistryError::NotFound(id))
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn nickname(&self, id: PlayerId) -> Option<&str> {
        self.players.get(&id).map(|p| p.nickname.as_str())
    }

    pub fn host(&self) -> Option<PlayerId> {
        self.host
    }

    pub fn is_host(&self, id: PlayerId) -> bool {
        self.host == Some(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players in connection order.
    pub fn in_order(&self) -> impl Iterator<Item = &Player> {
        self.connection_order
            .iter()
            .filter_map(|id| self.players.get(id))
    }

    /// Client-facing views, in connection order.
    pub fn views(&self) -> Vec<PlayerView> {
        self.in_order()
            .map(|p| p.view(self.is_host(p.id)))
            .collect()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    /// Registry with players 1..=n joined in order, none spectating.
    fn registry_with(n: u64) -> PlayerRegistry {
        let mut reg = PlayerRegistry::new();
        for id in 1..=n {
            reg.add_player(pid(id), false, None).unwrap();
        }
        reg
    }

    // =====================================================================
    // add_player()
    // =====================================================================

    #[test]
    fn test_add_player_first_becomes_host() {
        let reg = registry_with(2);
        assert_eq!(reg.host(), Some(pid(1)));
        assert!(reg.is_host(pid(1)));
        assert!(!reg.is_host(pid(2)));
    }

    #[test]
    fn test_add_player_generates_nickname_when_none_given() {
        let mut reg = PlayerRegistry::new();
        let player = reg.add_player(pid(1), false, None).unwrap();
        assert!(!player.nickname.is_empty());
        assert!(player.nickname.chars().count() <= crate::MAX_NICKNAME_CHARS);
    }

    #[test]
    fn test_add_player_uses_supplied_nickname_trimmed() {
        let mut reg = PlayerRegistry::new();
        let player = reg.add_player(pid(1), false, Some("  grace ")).unwrap();
        assert_eq!(player.nickname, "grace");
    }

    #[test]
    fn test_add_player_invalid_nickname_leaves_registry_unchanged() {
        let mut reg = PlayerRegistry::new();
        let result = reg.add_player(pid(1), false, Some(""));
        assert_eq!(result.unwrap_err(), RegistryError::EmptyNickname);
        assert!(reg.is_empty());
        assert_eq!(reg.host(), None);
    }

    #[test]
    fn test_add_player_duplicate_id_returns_error() {
        let mut reg = registry_with(1);
        assert_eq!(
            reg.add_player(pid(1), false, None).unwrap_err(),
            RegistryError::AlreadyPresent(pid(1))
        );
    }

    #[test]
    fn test_add_player_mid_round_is_spectator() {
        let mut reg = registry_with(1);
        let player = reg.add_player(pid(2), true, None).unwrap();
        assert!(player.is_spectator);
        assert!(!player.is_ready);
    }

    // =====================================================================
    // Host succession
    // =====================================================================

    #[test]
    fn test_remove_host_promotes_earliest_joined() {
        let mut reg = registry_with(3);
        // Readiness must not affect the choice.
        reg.toggle_ready(pid(3)).unwrap();

        let departure = reg.remove_player(pid(1)).unwrap();
        assert!(departure.was_host);
        assert_eq!(departure.new_host, Some(pid(2)));
        assert_eq!(reg.host(), Some(pid(2)));
    }

    #[test]
    fn test_remove_non_host_keeps_host() {
        let mut reg = registry_with(3);
        let departure = reg.remove_player(pid(2)).unwrap();
        assert!(!departure.was_host);
        assert_eq!(departure.new_host, Some(pid(1)));
    }

    #[test]
    fn test_remove_last_player_clears_host() {
        let mut reg = registry_with(1);
        let departure = reg.remove_player(pid(1)).unwrap();
        assert!(departure.was_host);
        assert_eq!(departure.new_host, None);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_host_succession_skips_departed_players() {
        let mut reg = registry_with(4);
        reg.remove_player(pid(2)).unwrap();
        reg.remove_player(pid(1)).unwrap();
        assert_eq!(reg.host(), Some(pid(3)));
    }

    #[test]
    fn test_rejoining_player_goes_to_back_of_order() {
        let mut reg = registry_with(2);
        reg.remove_player(pid(1)).unwrap();
        reg.add_player(pid(5), false, None).unwrap();
        let order: Vec<PlayerId> = reg.in_order().map(|p| p.id).collect();
        assert_eq!(order, vec![pid(2), pid(5)]);
        assert_eq!(reg.host(), Some(pid(2)));
    }

    #[test]
    fn test_remove_unknown_player_returns_not_found() {
        let mut reg = registry_with(1);
        assert_eq!(
            reg.remove_player(pid(9)).unwrap_err(),
            RegistryError::NotFound(pid(9))
        );
    }

    // =====================================================================
    // Ready flags and turn candidates
    // =====================================================================

    #[test]
    fn test_toggle_ready_flips_flag() {
        let mut reg = registry_with(1);
        assert_eq!(reg.toggle_ready(pid(1)), Ok(true));
        assert_eq!(reg.toggle_ready(pid(1)), Ok(false));
    }

    #[test]
    fn test_all_participants_ready_requires_everyone() {
        let mut reg = registry_with(3);
        reg.toggle_ready(pid(1)).unwrap();
        reg.toggle_ready(pid(2)).unwrap();
        assert_eq!(reg.ready_count(), 2);
        assert!(!reg.all_participants_ready());

        reg.toggle_ready(pid(3)).unwrap();
        assert!(reg.all_participants_ready());
    }

    #[test]
    fn test_all_participants_ready_ignores_spectators() {
        let mut reg = registry_with(1);
        reg.add_player(pid(2), true, None).unwrap();
        reg.toggle_ready(pid(1)).unwrap();
        assert!(reg.all_participants_ready());
    }

    #[test]
    fn test_all_participants_ready_empty_is_false() {
        let reg = PlayerRegistry::new();
        assert!(!reg.all_participants_ready());
    }

    #[test]
    fn test_turn_candidates_are_ready_players_in_join_order() {
        let mut reg = registry_with(4);
        reg.toggle_ready(pid(4)).unwrap();
        reg.toggle_ready(pid(2)).unwrap();
        reg.toggle_ready(pid(1)).unwrap();
        assert_eq!(reg.turn_candidates(), vec![pid(1), pid(2), pid(4)]);
    }

    #[test]
    fn test_integrate_spectators_marks_everyone_ready() {
        let mut reg = registry_with(2);
        reg.add_player(pid(3), true, None).unwrap();
        reg.add_player(pid(4), true, None).unwrap();

        let integrated = reg.integrate_spectators();
        assert_eq!(integrated, vec![pid(3), pid(4)]);
        assert_eq!(reg.turn_candidates(), vec![pid(1), pid(2), pid(3), pid(4)]);
    }

    #[test]
    fn test_reset_round_flags_clears_ready_and_spectator() {
        let mut reg = registry_with(1);
        reg.toggle_ready(pid(1)).unwrap();
        reg.add_player(pid(2), true, None).unwrap();

        reg.reset_round_flags();
        assert!(reg.in_order().all(|p| !p.is_ready && !p.is_spectator));
    }

    // =====================================================================
    // Nicknames and views
    // =====================================================================

    #[test]
    fn test_set_nickname_rejects_invalid_and_keeps_old() {
        let mut reg = PlayerRegistry::new();
        reg.add_player(pid(1), false, Some("ada")).unwrap();
        assert!(reg.set_nickname(pid(1), &"x".repeat(30)).is_err());
        assert_eq!(reg.nickname(pid(1)), Some("ada"));

        assert_eq!(reg.set_nickname(pid(1), " grace "), Ok("grace"));
        assert_eq!(reg.nickname(pid(1)), Some("grace"));
    }

    #[test]
    fn test_views_follow_connection_order_and_mark_host() {
        let reg = registry_with(3);
        let views = reg.views();
        let ids: Vec<_> = views.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![pid(1), pid(2), pid(3)]);
        assert!(views[0].is_host);
        assert!(!views[1].is_host);
    }
}
