//! Turn rotation.
//!
//! [`TurnOrder`] holds the active turn order snapshot, the index of the
//! current holder, and when the current turn started. It never touches
//! timers itself: the session machine asks it for the remaining time on
//! every tick and (re)arms the room's tick scheduler when a turn starts.
//!
//! # Removal policy
//!
//! Removing a player keeps the *same logical* holder wherever possible:
//!
//! ```text
//! order [A, B, C, D], index 2 (C holds)
//!   remove A  → [B, C, D], index 1   (C still holds)
//!   remove D  → [B, C],    index 1   (C still holds)
//!   remove C  → [B],       index 0   (holder gone: B is next, restart turn)
//! ```

use std::time::Duration;

use codeturn_protocol::PlayerId;
use tokio::time::Instant;

/// Result of [`TurnOrder::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRemoval {
    /// The player wasn't in the order (spectator, or lobby).
    NotPresent,
    /// Removed. If `was_holder`, the next player now sits at the current
    /// index and the turn must be restarted.
    Removed { was_holder: bool },
    /// Removed and nobody is left.
    Emptied,
}

#[derive(Debug, Default)]
pub struct TurnOrder {
    order: Vec<PlayerId>,
    index: usize,
    turn_started: Option<Instant>,
}

impl TurnOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the order with a fresh snapshot. The first player holds
    /// the next turn; no turn is running until [`start`](Self::start).
    pub fn snapshot(&mut self, order: Vec<PlayerId>) {
        self.order = order;
        self.index = 0;
        self.turn_started = None;
    }

    pub fn clear(&mut self) {
        self.snapshot(Vec::new());
    }

    /// Start a turn for the player at the current index.
    ///
    /// The index is normalized first, so a stale index never points past
    /// the end. Returns the holder, or `None` if the order is empty.
    pub fn start(&mut self, now: Instant) -> Option<PlayerId> {
        if self.order.is_empty() {
            self.index = 0;
            self.turn_started = None;
            return None;
        }
        self.index %= self.order.len();
        self.turn_started = Some(now);
        Some(self.order[self.index])
    }

    /// Hand the turn to the next player (circularly) and start it.
    pub fn advance(&mut self, now: Instant) -> Option<PlayerId> {
        if !self.order.is_empty() {
            self.index = (self.index + 1) % self.order.len();
        }
        self.start(now)
    }

    /// Freeze the turn clock without changing the holder.
    pub fn stop(&mut self) {
        self.turn_started = None;
    }

    /// Remove a departing player, keeping the same logical holder.
    pub fn remove(&mut self, id: PlayerId) -> TurnRemoval {
        let Some(pos) = self.order.iter().position(|&p| p == id) else {
            return TurnRemoval::NotPresent;
        };
        self.order.remove(pos);

        if self.order.is_empty() {
            self.index = 0;
            self.turn_started = None;
            return TurnRemoval::Emptied;
        }

        let was_holder = pos == self.index;
        if pos < self.index {
            self.index -= 1;
        } else if was_holder {
            // The next player slid into this slot; wrap if it was the last.
            self.index %= self.order.len();
        }
        TurnRemoval::Removed { was_holder }
    }

    /// Whole seconds left in the running turn, saturating at zero.
    /// `None` while no turn is running.
    pub fn remaining(&self, now: Instant, turn_time: Duration) -> Option<u64> {
        let started = self.turn_started?;
        let elapsed = now.saturating_duration_since(started).as_secs();
        Some(turn_time.as_secs().saturating_sub(elapsed))
    }

    pub fn holder(&self) -> Option<PlayerId> {
        self.order.get(self.index).copied()
    }

    pub fn is_holder(&self, id: PlayerId) -> bool {
        self.holder() == Some(id)
    }

    pub fn is_running(&self) -> bool {
        self.turn_started.is_some()
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.order.contains(&id)
    }

    pub fn order(&self) -> &[PlayerId] {
        &self.order
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
