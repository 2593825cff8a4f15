//! The session state machine.
//!
//! [`SessionMachine`] owns everything one session mutates: the phase, the
//! [`PlayerRegistry`], the [`TurnOrder`], the shared buffer, and the
//! current level activation. It is plain synchronous code with no timers,
//! channels, or I/O. Every handler takes the current instant and returns
//! a list of [`Effect`]s for the room actor to carry out, in order.
//!
//! ```text
//!              ┌────────────── room actor (one task per room) ──────────────┐
//! joins/leaves │                                                            │
//! actions   ──►│  SessionMachine::handle_*(.., now) ──► Vec<Effect> ──► apply│──► players
//! ticks        │         ▲                                   │              │
//! transitions  │         └──── EvaluationOutcome ◄── worker ◄┘ Evaluate     │
//! eval results └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keeping it pure means every rule below is unit-tested without a
//! runtime, a socket, or a Python interpreter.
//!
//! # Level activations
//!
//! Each time a level is loaded (game start, next level, host reset) the
//! activation counter goes up, one test case is pinned, and the buffer is
//! reset. Evaluation jobs carry the activation they were started under;
//! results for any other activation are stale and dropped. Only one job
//! per activation runs at a time.

use std::sync::Arc;
use std::time::Duration;

use codeturn_eval::{EntryCall, ScoreRules, Submission, Verdict};
use codeturn_players::{PlayerRegistry, RegistryError};
use codeturn_protocol::{
    ClientEvent, FeedbackKind, GameStateView, PlayerId, Recipient, ServerEvent, SessionPhase,
};
use rand::Rng;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::can_transition;
use crate::turn::{TurnOrder, TurnRemoval};
use crate::{ActionError, LevelCatalog, RoomConfig};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// A player action routed to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    SetNickname { nickname: String },
    ToggleReady,
    CodeUpdate { code: String },
    PassTurn,
    ResetLevel,
    ForceResetToLobby,
    KickPlayer { target: PlayerId },
    SubmitCode,
}

impl SessionAction {
    /// The session-scoped part of a client event. Room-management events
    /// (`createRoom`, `listRooms`, `joinRoom`) return `None`.
    pub fn from_client(event: ClientEvent) -> Option<Self> {
        Some(match event {
            ClientEvent::SetNickname { nickname } => Self::SetNickname { nickname },
            ClientEvent::ToggleReady => Self::ToggleReady,
            ClientEvent::CodeUpdate { code } => Self::CodeUpdate { code },
            ClientEvent::PassTurn => Self::PassTurn,
            ClientEvent::ResetLevel => Self::ResetLevel,
            ClientEvent::ForceResetToLobby => Self::ForceResetToLobby,
            ClientEvent::KickPlayer { target_id } => Self::KickPlayer { target: target_id },
            ClientEvent::SubmitCode => Self::SubmitCode,
            ClientEvent::CreateRoom { .. }
            | ClientEvent::ListRooms
            | ClientEvent::JoinRoom { .. } => return None,
        })
    }
}

/// A scheduled, internally generated session event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// LEVEL_COMPLETE → PLAYING (next level).
    NextLevel,
    /// GAME_OVER → LOBBY.
    ReturnToLobby,
}

/// A submission handed to a worker task.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationJob {
    pub submitter: PlayerId,
    pub activation: u64,
    pub code_chars: usize,
    pub submission: Submission,
}

impl EvaluationJob {
    /// Pair this job with its verdict.
    pub fn into_outcome(self, verdict: Verdict) -> EvaluationOutcome {
        EvaluationOutcome {
            submitter: self.submitter,
            activation: self.activation,
            code_chars: self.code_chars,
            verdict,
        }
    }
}

/// A finished evaluation, fed back into the session's event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOutcome {
    pub submitter: PlayerId,
    pub activation: u64,
    pub code_chars: usize,
    pub verdict: Verdict,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Something the room actor must do on the machine's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(Recipient, ServerEvent),
    /// Restart the 1 Hz turn tick (replaces any running one).
    ArmTurnTimer,
    DisarmTurnTimer,
    /// Fire a transition after a delay (replaces any pending one).
    Schedule(Transition, Duration),
    CancelScheduled,
    /// Run a submission off the actor and report back.
    Evaluate(EvaluationJob),
    /// Close this player's connection. Their removal follows as effects.
    Disconnect(PlayerId),
}

/// The `(input, expectedOutput)` pair pinned for one activation.
#[derive(Debug, Clone, PartialEq)]
pub struct PinnedCase {
    pub args: Vec<Value>,
    pub expected: Value,
}

// ---------------------------------------------------------------------------
// SessionMachine
// ---------------------------------------------------------------------------

pub struct SessionMachine {
    config: RoomConfig,
    catalog: Arc<LevelCatalog>,
    score_rules: ScoreRules,
    phase: SessionPhase,
    registry: PlayerRegistry,
    turns: TurnOrder,
    level_index: usize,
    activation: u64,
    level_started: Option<Instant>,
    code: String,
    pinned: Option<PinnedCase>,
    /// Activation of the submission currently being evaluated, if any.
    in_flight: Option<u64>,
}

impl SessionMachine {
    pub fn new(config: RoomConfig, catalog: Arc<LevelCatalog>, score_rules: ScoreRules) -> Self {
        Self {
            config,
            catalog,
            score_rules,
            phase: SessionPhase::Lobby,
            registry: PlayerRegistry::new(),
            turns: TurnOrder::new(),
            level_index: 0,
            activation: 0,
            level_started: None,
            code: String::new(),
            pinned: None,
            in_flight: None,
        }
    }

    // -- Accessors --------------------------------------------------------

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn turns(&self) -> &TurnOrder {
        &self.turns
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn level_index(&self) -> usize {
        self.level_index
    }

    pub fn activation(&self) -> u64 {
        self.activation
    }

    pub fn pinned_case(&self) -> Option<&PinnedCase> {
        self.pinned.as_ref()
    }

    pub fn player_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_full(&self) -> bool {
        self.registry.len() >= self.config.max_players
    }

    // -- Membership -------------------------------------------------------

    /// Add a connection to the session.
    ///
    /// Players joining mid-round become spectators until the next level.
    pub fn join(
        &mut self,
        id: PlayerId,
        nickname: Option<&str>,
        now: Instant,
    ) -> Result<Vec<Effect>, ActionError> {
        if self.is_full() {
            return Err(ActionError::validation("room is full"));
        }
        let spectator = self.phase.is_round_active();
        let player = self
            .registry
            .add_player(id, spectator, nickname)
            .map_err(registry_error)?;
        let nickname = player.nickname.clone();
        info!(player_id = %id, %nickname, spectator, phase = %self.phase, "player joined session");

        let mut effects = vec![Effect::Send(
            Recipient::Player(id),
            ServerEvent::YourInfo { id, nickname },
        )];
        if spectator {
            effects.push(feedback(
                Recipient::Player(id),
                FeedbackKind::Info,
                "A round is in progress. You'll join the turn order at the next level.",
            ));
        }
        if let Some(event) = self.turn_update() {
            effects.push(Effect::Send(Recipient::Player(id), event));
        }
        effects.push(self.snapshot_effect(now));
        Ok(effects)
    }

    /// Remove a connection. Unknown ids are ignored.
    pub fn leave(&mut self, id: PlayerId, now: Instant) -> Vec<Effect> {
        let departure = match self.registry.remove_player(id) {
            Ok(departure) => departure,
            Err(_) => return Vec::new(),
        };
        info!(player_id = %id, phase = %self.phase, remaining = self.registry.len(), "player left session");

        let mut effects = Vec::new();
        match self.turns.remove(id) {
            TurnRemoval::Removed { was_holder: true } if self.phase == SessionPhase::Playing => {
                debug!(player_id = %id, "turn holder left, passing turn");
                effects.extend(self.begin_turn(now));
            }
            TurnRemoval::NotPresent | TurnRemoval::Removed { .. } | TurnRemoval::Emptied => {}
        }

        if departure.was_host {
            if let Some(host) = departure.new_host {
                let name = self.display_name(host);
                effects.push(feedback(
                    Recipient::All,
                    FeedbackKind::Info,
                    format!("{name} is now the host."),
                ));
            }
        }

        if let Some(reset) = self.enforce_safety_valve(now) {
            effects.extend(reset);
            return effects;
        }

        // Someone who wasn't ready may have been the only holdout.
        effects.extend(self.maybe_start_game(now));
        effects.push(self.snapshot_effect(now));
        effects
    }

    // -- Player actions ---------------------------------------------------

    /// Apply one player action.
    ///
    /// # Errors
    /// Returns an [`ActionError`] (and changes nothing) when the action is
    /// malformed, illegal in the current phase, or not the sender's to take.
    pub fn handle_action(
        &mut self,
        sender: PlayerId,
        action: SessionAction,
        now: Instant,
    ) -> Result<Vec<Effect>, ActionError> {
        if !self.registry.contains(sender) {
            return Err(ActionError::authorization("you are not in this room"));
        }
        match action {
            SessionAction::SetNickname { nickname } => self.set_nickname(sender, &nickname, now),
            SessionAction::ToggleReady => self.toggle_ready(sender, now),
            SessionAction::CodeUpdate { code } => self.code_update(sender, code),
            SessionAction::PassTurn => self.pass_turn(sender, now),
            SessionAction::ResetLevel => self.reset_level(sender, now),
            SessionAction::ForceResetToLobby => self.force_reset(sender, now),
            SessionAction::KickPlayer { target } => self.kick(sender, target, now),
            SessionAction::SubmitCode => self.submit(sender),
        }
    }

    fn set_nickname(
        &mut self,
        sender: PlayerId,
        raw: &str,
        now: Instant,
    ) -> Result<Vec<Effect>, ActionError> {
        let nickname = self
            .registry
            .set_nickname(sender, raw)
            .map_err(registry_error)?
            .to_string();

        let mut effects = vec![Effect::Send(
            Recipient::Player(sender),
            ServerEvent::YourInfo { id: sender, nickname },
        )];
        if self.turns.is_holder(sender) && self.phase == SessionPhase::Playing {
            effects.extend(self.turn_update().map(|e| Effect::Send(Recipient::All, e)));
        }
        effects.push(self.snapshot_effect(now));
        Ok(effects)
    }

    fn toggle_ready(&mut self, sender: PlayerId, now: Instant) -> Result<Vec<Effect>, ActionError> {
        if self.phase != SessionPhase::Lobby {
            return Err(ActionError::validation("readiness can only change in the lobby"));
        }
        let ready = self.registry.toggle_ready(sender).map_err(registry_error)?;
        debug!(player_id = %sender, ready, "ready toggled");

        let mut effects = self.maybe_start_game(now);
        effects.push(self.snapshot_effect(now));
        Ok(effects)
    }

    fn code_update(&mut self, sender: PlayerId, code: String) -> Result<Vec<Effect>, ActionError> {
        self.require_playing()?;
        self.require_holder(sender)?;
        if code.len() > self.config.max_code_bytes {
            return Err(ActionError::validation(format!(
                "code is too large ({} bytes, max {})",
                code.len(),
                self.config.max_code_bytes
            )));
        }
        self.code = code.clone();
        Ok(vec![Effect::Send(
            Recipient::AllExcept(sender),
            ServerEvent::CodeUpdate { code },
        )])
    }

    fn pass_turn(&mut self, sender: PlayerId, now: Instant) -> Result<Vec<Effect>, ActionError> {
        self.require_playing()?;
        self.require_holder(sender)?;
        let next = self.turns.advance(now);
        debug!(player_id = %sender, next = ?next, "turn passed");
        let mut effects = self.begin_turn(now);
        effects.push(self.snapshot_effect(now));
        Ok(effects)
    }

    fn reset_level(&mut self, sender: PlayerId, now: Instant) -> Result<Vec<Effect>, ActionError> {
        self.require_host(sender, "only the host can reset the level")?;
        self.require_playing()?;

        self.activate_level(now);
        info!(level = self.level_index + 1, activation = self.activation, "level reset by host");

        let mut effects = vec![
            Effect::Send(
                Recipient::All,
                ServerEvent::CodeUpdate {
                    code: self.code.clone(),
                },
            ),
            feedback(Recipient::All, FeedbackKind::Warning, "The host reset the level."),
        ];
        effects.push(self.snapshot_effect(now));
        Ok(effects)
    }

    fn force_reset(&mut self, sender: PlayerId, now: Instant) -> Result<Vec<Effect>, ActionError> {
        self.require_host(sender, "only the host can reset the game")?;
        if self.phase == SessionPhase::Lobby {
            return Err(ActionError::validation("already in the lobby"));
        }
        Ok(self.reset_to_lobby("the host reset the game", now))
    }

    fn kick(
        &mut self,
        sender: PlayerId,
        target: PlayerId,
        now: Instant,
    ) -> Result<Vec<Effect>, ActionError> {
        self.require_host(sender, "only the host can kick players")?;
        if target == sender {
            return Err(ActionError::validation("you can't kick yourself"));
        }
        let Some(name) = self.registry.nickname(target).map(str::to_string) else {
            return Err(ActionError::validation("player not found"));
        };
        info!(player_id = %target, host = %sender, "player kicked");

        let mut effects = vec![
            Effect::Send(
                Recipient::Player(target),
                ServerEvent::Kicked {
                    message: "You were removed from the room by the host.".to_string(),
                },
            ),
            Effect::Disconnect(target),
        ];
        effects.extend(self.leave(target, now));
        effects.push(feedback(
            Recipient::All,
            FeedbackKind::Info,
            format!("{name} was removed by the host."),
        ));
        Ok(effects)
    }

    fn submit(&mut self, sender: PlayerId) -> Result<Vec<Effect>, ActionError> {
        self.require_playing()?;
        if self.registry.get(sender).is_some_and(|p| p.is_spectator) {
            return Err(ActionError::authorization("spectators can't submit"));
        }
        if self.in_flight == Some(self.activation) {
            return Err(ActionError::validation("a submission is already running"));
        }

        let Some(level) = self.catalog.get(self.level_index) else {
            error!(level_index = self.level_index, "active level missing from catalog");
            return Ok(vec![internal_failure(sender)]);
        };

        let (call, expected) = if level.has_inputs() {
            let Some(pinned) = &self.pinned else {
                error!(level_id = level.id, activation = self.activation, "function level has no pinned case");
                return Ok(vec![internal_failure(sender)]);
            };
            (
                Some(EntryCall::new(level.entry_function(), pinned.args.clone())),
                pinned.expected.clone(),
            )
        } else {
            (None, level.expected_value.clone().unwrap_or(Value::Null))
        };

        let job = EvaluationJob {
            submitter: sender,
            activation: self.activation,
            code_chars: self.code.chars().count(),
            submission: Submission {
                code: self.code.clone(),
                call,
                expected_type: level.expected_type,
                expected,
            },
        };
        debug!(player_id = %sender, level_id = level.id, activation = self.activation, "submission queued");
        self.in_flight = Some(self.activation);

        Ok(vec![
            feedback(Recipient::Player(sender), FeedbackKind::Info, "Running your code..."),
            Effect::Evaluate(job),
        ])
    }

    // -- Internally generated events --------------------------------------

    /// One tick of the turn countdown.
    pub fn handle_tick(&mut self, now: Instant) -> Vec<Effect> {
        if self.phase != SessionPhase::Playing {
            return vec![Effect::DisarmTurnTimer];
        }
        let Some(remaining) = self.turns.remaining(now, self.config.turn_time()) else {
            return vec![Effect::DisarmTurnTimer];
        };
        if remaining > 0 {
            return vec![Effect::Send(
                Recipient::All,
                ServerEvent::TurnTimerUpdate {
                    seconds_remaining: remaining,
                },
            )];
        }

        debug!(holder = ?self.turns.holder(), "turn timed out");
        self.turns.advance(now);
        let mut effects = self.begin_turn(now);
        effects.push(self.snapshot_effect(now));
        effects
    }

    /// A scheduled transition fired.
    pub fn handle_transition(&mut self, transition: Transition, now: Instant) -> Vec<Effect> {
        match (transition, self.phase) {
            (Transition::NextLevel, SessionPhase::LevelComplete) => self.next_level(now),
            (Transition::ReturnToLobby, SessionPhase::GameOver) => {
                self.reset_to_lobby("the round is over", now)
            }
            (transition, phase) => {
                debug!(?transition, %phase, "ignoring transition for another phase");
                Vec::new()
            }
        }
    }

    /// A worker finished evaluating a submission.
    pub fn handle_evaluation(&mut self, outcome: EvaluationOutcome, now: Instant) -> Vec<Effect> {
        if self.in_flight == Some(outcome.activation) {
            self.in_flight = None;
        }
        if outcome.activation != self.activation || self.phase != SessionPhase::Playing {
            debug!(
                player_id = %outcome.submitter,
                result_activation = outcome.activation,
                current_activation = self.activation,
                phase = %self.phase,
                "discarding stale evaluation result"
            );
            return Vec::new();
        }
        let to_submitter = |message: String| {
            vec![Effect::Send(
                Recipient::Player(outcome.submitter),
                ServerEvent::SubmissionResult {
                    success: false,
                    message,
                    level_id: None,
                    score: None,
                },
            )]
        };

        match outcome.verdict {
            Verdict::Correct { .. } => {
                self.level_solved(outcome.submitter, outcome.code_chars, now)
            }
            Verdict::Mismatch {
                expected_type,
                expected,
                obtained,
            } => to_submitter(format!(
                "Wrong output. Expected ({expected_type}): {expected}, got: {obtained}"
            )),
            Verdict::Timeout { limit } => to_submitter(format!(
                "Your code ran longer than {}s and was stopped.",
                limit.as_secs()
            )),
            Verdict::RuntimeError { diagnostic } => to_submitter(format!("Error: {diagnostic}")),
            Verdict::MissingEntryFunction { function } => {
                to_submitter(format!("Function '{function}' is not defined."))
            }
            Verdict::Internal { reason } => {
                error!(player_id = %outcome.submitter, %reason, "submission could not be evaluated");
                vec![internal_failure(outcome.submitter)]
            }
        }
    }

    // -- Phase changes ----------------------------------------------------

    fn maybe_start_game(&mut self, now: Instant) -> Vec<Effect> {
        if self.phase != SessionPhase::Lobby
            || self.registry.ready_count() < self.config.min_ready_players.max(1)
            || !self.registry.all_participants_ready()
        {
            return Vec::new();
        }
        self.start_game(now)
    }

    fn start_game(&mut self, now: Instant) -> Vec<Effect> {
        self.turns.snapshot(self.registry.turn_candidates());
        self.level_index = 0;
        self.set_phase(SessionPhase::Playing);
        self.activate_level(now);
        info!(players = self.turns.len(), levels = self.catalog.len(), "game started");

        let mut effects = vec![feedback(Recipient::All, FeedbackKind::Success, "Game started!")];
        effects.extend(self.begin_turn(now));
        effects.push(self.snapshot_effect(now));
        effects
    }

    fn level_solved(&mut self, solver: PlayerId, code_chars: usize, now: Instant) -> Vec<Effect> {
        let elapsed = self
            .level_started
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();
        let score = self.score_rules.score(elapsed, code_chars);
        let level_id = self.catalog.get(self.level_index).map(|l| l.id);
        info!(
            player_id = %solver,
            level = self.level_index + 1,
            elapsed_ms = elapsed.as_millis() as u64,
            score,
            "level completed"
        );

        let mut effects = vec![Effect::Send(
            Recipient::All,
            ServerEvent::SubmissionResult {
                success: true,
                message: format!(
                    "Level {} completed in {:.1}s! Score: {score}",
                    level_id.unwrap_or_default(),
                    elapsed.as_secs_f64()
                ),
                level_id,
                score: Some(score),
            },
        )];

        if self.catalog.is_last(self.level_index) {
            effects.extend(self.game_over(now));
        } else {
            self.set_phase(SessionPhase::LevelComplete);
            self.turns.stop();
            // Results for this activation are settled.
            self.next_activation();
            effects.push(Effect::DisarmTurnTimer);
            effects.push(Effect::Schedule(
                Transition::NextLevel,
                self.config.level_complete_delay(),
            ));
            effects.push(self.snapshot_effect(now));
        }
        effects
    }

    fn next_level(&mut self, now: Instant) -> Vec<Effect> {
        let integrated = self.registry.integrate_spectators();
        if !integrated.is_empty() {
            debug!(count = integrated.len(), "spectators joined the turn order");
        }
        self.turns.snapshot(self.registry.turn_candidates());
        if self.turns.is_empty() {
            return self.reset_to_lobby("not enough players", now);
        }

        self.level_index += 1;
        self.set_phase(SessionPhase::Playing);
        self.activate_level(now);
        info!(level = self.level_index + 1, players = self.turns.len(), "next level");

        let mut effects = self.begin_turn(now);
        effects.push(self.snapshot_effect(now));
        effects
    }

    fn game_over(&mut self, now: Instant) -> Vec<Effect> {
        self.set_phase(SessionPhase::GameOver);
        self.turns.clear();
        self.registry.reset_round_flags();
        self.next_activation();
        info!("all levels completed");

        vec![
            Effect::DisarmTurnTimer,
            Effect::Send(
                Recipient::All,
                ServerEvent::GameComplete {
                    message: "Congratulations, all levels completed!".to_string(),
                },
            ),
            Effect::Schedule(Transition::ReturnToLobby, self.config.level_complete_delay()),
            self.snapshot_effect(now),
        ]
    }

    fn reset_to_lobby(&mut self, reason: &str, now: Instant) -> Vec<Effect> {
        info!(from = %self.phase, reason, "returning to lobby");
        self.set_phase(SessionPhase::Lobby);
        self.turns.clear();
        self.registry.reset_round_flags();
        self.level_index = 0;
        self.next_activation();
        self.level_started = None;
        self.code.clear();
        self.pinned = None;

        vec![
            Effect::DisarmTurnTimer,
            Effect::CancelScheduled,
            feedback(
                Recipient::All,
                FeedbackKind::Warning,
                format!("Back to the lobby: {reason}."),
            ),
            self.snapshot_effect(now),
        ]
    }

    /// Reset to the lobby if a round is running with nobody to play it or
    /// nobody to host it.
    fn enforce_safety_valve(&mut self, now: Instant) -> Option<Vec<Effect>> {
        let no_players = self.phase.is_round_active() && self.turns.is_empty();
        let no_host = self.phase != SessionPhase::Lobby && self.registry.host().is_none();
        if no_players || no_host {
            warn!(phase = %self.phase, no_players, no_host, "session can't continue");
            Some(self.reset_to_lobby("not enough players", now))
        } else {
            None
        }
    }

    fn set_phase(&mut self, to: SessionPhase) {
        if !can_transition(self.phase, to) {
            warn!(from = %self.phase, %to, "unexpected phase transition");
        }
        self.phase = to;
    }

    // -- Level and turn helpers -------------------------------------------

    /// Start a new activation. Pending results become stale, so nothing is
    /// in flight any more.
    fn next_activation(&mut self) {
        self.activation += 1;
        self.in_flight = None;
    }

    /// Load the current level: new activation, fresh buffer, new pinned
    /// case, level clock restarted.
    fn activate_level(&mut self, now: Instant) {
        self.next_activation();
        self.level_started = Some(now);
        let Some(level) = self.catalog.get(self.level_index) else {
            error!(level_index = self.level_index, "level index past the catalog");
            self.code.clear();
            self.pinned = None;
            return;
        };
        self.code = level.starting_code();
        self.pinned = match level.case_count() {
            0 => None,
            n => {
                let pick = rand::rng().random_range(0..n);
                level
                    .case(pick)
                    .map(|(args, expected)| PinnedCase { args, expected })
            }
        };
        debug!(level_id = level.id, activation = self.activation, pinned = ?self.pinned, "level activated");
    }

    /// Start the turn of whoever is at the current index.
    fn begin_turn(&mut self, now: Instant) -> Vec<Effect> {
        if self.turns.start(now).is_none() {
            return vec![Effect::DisarmTurnTimer];
        }
        let mut effects = vec![Effect::ArmTurnTimer];
        effects.extend(self.turn_update().map(|e| Effect::Send(Recipient::All, e)));
        effects.push(Effect::Send(
            Recipient::All,
            ServerEvent::TurnTimerUpdate {
                seconds_remaining: self.config.turn_secs,
            },
        ));
        effects
    }

    fn turn_update(&self) -> Option<ServerEvent> {
        if !self.turns.is_running() {
            return None;
        }
        let holder = self.turns.holder()?;
        Some(ServerEvent::TurnUpdate {
            player_id: holder,
            nickname: self.display_name(holder),
        })
    }

    fn require_playing(&self) -> Result<(), ActionError> {
        if self.phase == SessionPhase::Playing {
            Ok(())
        } else {
            Err(ActionError::validation("no level is being played"))
        }
    }

    fn require_holder(&self, sender: PlayerId) -> Result<(), ActionError> {
        if self.turns.is_holder(sender) {
            Ok(())
        } else {
            Err(ActionError::authorization("it's not your turn"))
        }
    }

    fn require_host(&self, sender: PlayerId, message: &str) -> Result<(), ActionError> {
        if self.registry.is_host(sender) {
            Ok(())
        } else {
            Err(ActionError::authorization(message))
        }
    }

    fn display_name(&self, id: PlayerId) -> String {
        self.registry
            .nickname(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }

    // -- Snapshots --------------------------------------------------------

    /// The full client-facing state.
    pub fn snapshot(&self, now: Instant) -> GameStateView {
        let current_level = if self.phase == SessionPhase::Lobby {
            None
        } else {
            self.catalog
                .get(self.level_index)
                .map(|level| level.view(self.level_index + 1, self.catalog.len()))
        };
        GameStateView {
            game_state: self.phase,
            players: self.registry.views(),
            host_id: self.registry.host(),
            active_turn_order: self.turns.order().to_vec(),
            current_turn_index: self.turns.index(),
            current_level,
            current_code: self.code.clone(),
            chosen_input: self.pinned.as_ref().map(|p| p.args.clone()),
            chosen_expected_output: self.pinned.as_ref().map(|p| p.expected.clone()),
            turn_timer_remaining: self.turns.remaining(now, self.config.turn_time()),
        }
    }

    fn snapshot_effect(&self, now: Instant) -> Effect {
        Effect::Send(Recipient::All, ServerEvent::GameStateUpdate(self.snapshot(now)))
    }
}

fn feedback(recipient: Recipient, kind: FeedbackKind, message: impl Into<String>) -> Effect {
    Effect::Send(
        recipient,
        ServerEvent::Feedback {
            kind,
            title: None,
            message: message.into(),
        },
    )
}

fn internal_failure(submitter: PlayerId) -> Effect {
    Effect::Send(
        Recipient::Player(submitter),
        ServerEvent::SubmissionResult {
            success: false,
            message: "Internal error while evaluating your submission.".to_string(),
            level_id: None,
            score: None,
        },
    )
}

fn registry_error(err: RegistryError) -> ActionError {
    match err {
        RegistryError::NotFound(_) => ActionError::authorization("you are not in this room"),
        other => ActionError::validation(other.to_string()),
    }
}

// =========================================================================
// Tests
// =========================================================================
