//! Room actor: one Tokio task per room that owns a [`SessionMachine`].
//!
//! The actor is the only thing that touches a session. Everything that can
//! change it arrives as a message and is handled one at a time:
//!
//! ```text
//!   control (join/leave/info/shutdown) ─┐
//!   player actions ─────────────────────┤
//!   evaluation results ─────────────────┼──► biased select ──► SessionMachine ──► apply(effects)
//!   scheduled transition ───────────────┤
//!   turn tick ──────────────────────────┘
//! ```
//!
//! The select is biased in that order. A disconnect that is already
//! queued is always processed before a pending action of the same
//! player, and an action a player already sent is applied before a
//! result or timer that lands while it waits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use codeturn_eval::{Evaluator, ScoreRules};
use codeturn_protocol::{PlayerId, Recipient, ServerEvent, SessionPhase};
use codeturn_tick::{Deadline, TickScheduler};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::machine::{
    Effect, EvaluationJob, EvaluationOutcome, SessionAction, SessionMachine, Transition,
};
use crate::{LevelCatalog, RoomConfig, RoomError};

/// Period of the turn countdown.
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// An outbound message from the room actor to a player's connection.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomOutbound {
    Event(ServerEvent),
    /// The room is done with this connection (kicked, or the room shut
    /// down). The connection should be closed after flushing.
    Close,
}

/// Channel sender for delivering outbound messages to a player.
pub type PlayerSender = mpsc::UnboundedSender<RoomOutbound>;

/// Commands that change room membership or query the room.
///
/// These travel on their own channel so the actor can serve them ahead
/// of queued player actions.
pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        nickname: Option<String>,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Replies with the number of players left in the room.
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<usize>,
    },

    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },

    Shutdown,
}

/// A snapshot of room metadata (not the session itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub name: String,
    pub phase: SessionPhase,
    pub player_count: usize,
    pub max_players: usize,
}

/// Handle to a running room actor.
///
/// Cheap to clone: two `mpsc::Sender`s and the room name.
#[derive(Clone)]
pub struct RoomHandle {
    name: Arc<str>,
    control: mpsc::Sender<RoomCommand>,
    actions: mpsc::Sender<(PlayerId, SessionAction)>,
}

impl RoomHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.name.to_string())
    }

    /// Adds a player to the session. On success the player has already
    /// been sent `roomJoined`, `yourInfo` and a snapshot.
    pub async fn join(
        &self,
        player_id: PlayerId,
        nickname: Option<String>,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control
            .send(RoomCommand::Join {
                player_id,
                nickname,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Removes a player. Returns how many players remain.
    pub async fn leave(&self, player_id: PlayerId) -> Result<usize, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control
            .send(RoomCommand::Leave {
                player_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Queues a player action (fire-and-forget). Rejections come back to
    /// the player as `actionError`.
    pub async fn send_action(
        &self,
        sender: PlayerId,
        action: SessionAction,
    ) -> Result<(), RoomError> {
        self.actions
            .send((sender, action))
            .await
            .map_err(|_| self.unavailable())
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Non-blocking [`shutdown`](Self::shutdown). If the command queue is
    /// full the actor still stops once every handle is dropped.
    pub fn request_shutdown(&self) {
        let _ = self.control.try_send(RoomCommand::Shutdown);
    }

    /// Tells the room to shut down. Connected players get
    /// [`RoomOutbound::Close`].
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.control
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<E: Evaluator> {
    name: Arc<str>,
    machine: SessionMachine,
    /// Per-player outbound channels. Keys match the session's players.
    senders: HashMap<PlayerId, PlayerSender>,
    evaluator: Arc<E>,
    ticks: TickScheduler,
    transitions: Deadline<Transition>,
    control: mpsc::Receiver<RoomCommand>,
    actions: mpsc::Receiver<(PlayerId, SessionAction)>,
    results_tx: mpsc::UnboundedSender<EvaluationOutcome>,
    results_rx: mpsc::UnboundedReceiver<EvaluationOutcome>,
}

impl<E: Evaluator> RoomActor<E> {
    async fn run(mut self) {
        info!(room = %self.name, "room actor started");

        loop {
            tokio::select! {
                biased;

                cmd = self.control.recv() => match cmd {
                    Some(RoomCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },

                // Queued actions before results and timers.
                action = self.actions.recv() => match action {
                    Some((sender, action)) => self.handle_action(sender, action),
                    None => break,
                },

                Some(outcome) = self.results_rx.recv() => {
                    let effects = self.machine.handle_evaluation(outcome, Instant::now());
                    self.apply(effects);
                }

                transition = self.transitions.wait() => {
                    debug!(room = %self.name, ?transition, "transition fired");
                    let effects = self.machine.handle_transition(transition, Instant::now());
                    self.apply(effects);
                }

                tick = self.ticks.wait_for_tick() => {
                    if tick.ticks_skipped > 0 {
                        debug!(room = %self.name, skipped = tick.ticks_skipped, "late turn tick");
                    }
                    let effects = self.machine.handle_tick(Instant::now());
                    self.apply(effects);
                }
            }
        }

        self.close_all();
        info!(room = %self.name, "room actor stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                player_id,
                nickname,
                sender,
                reply,
            } => {
                let result = self.handle_join(player_id, nickname.as_deref(), sender);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { player_id, reply } => {
                self.handle_leave(player_id);
                let _ = reply.send(self.senders.len());
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            // Handled by the run loop.
            RoomCommand::Shutdown => {}
        }
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        nickname: Option<&str>,
        sender: PlayerSender,
    ) -> Result<(), RoomError> {
        if self.senders.contains_key(&player_id) {
            return Err(RoomError::AlreadyInRoom(player_id));
        }
        if self.machine.is_full() {
            return Err(RoomError::RoomFull(self.name.to_string()));
        }
        let effects = self
            .machine
            .join(player_id, nickname, Instant::now())
            .map_err(|e| RoomError::Rejected(e.to_string()))?;

        let _ = sender.send(RoomOutbound::Event(ServerEvent::RoomJoined {
            room_name: self.name.to_string(),
        }));
        self.senders.insert(player_id, sender);
        info!(room = %self.name, %player_id, players = self.senders.len(), "player joined room");
        self.apply(effects);
        Ok(())
    }

    fn handle_leave(&mut self, player_id: PlayerId) {
        // A kicked player is already gone from the session.
        if self.senders.remove(&player_id).is_none() {
            debug!(room = %self.name, %player_id, "leave for a player not in the room");
            return;
        }
        info!(room = %self.name, %player_id, players = self.senders.len(), "player left room");
        let effects = self.machine.leave(player_id, Instant::now());
        self.apply(effects);
    }

    fn handle_action(&mut self, sender: PlayerId, action: SessionAction) {
        match self.machine.handle_action(sender, action, Instant::now()) {
            Ok(effects) => self.apply(effects),
            Err(err) => {
                debug!(room = %self.name, player_id = %sender, %err, "action rejected");
                self.send_to(
                    sender,
                    RoomOutbound::Event(ServerEvent::ActionError {
                        message: err.to_string(),
                    }),
                );
            }
        }
    }

    /// Carries out the machine's effects, in order.
    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(recipient, event) => self.dispatch(recipient, event),
                Effect::ArmTurnTimer => self.ticks.arm(),
                Effect::DisarmTurnTimer => self.ticks.disarm(),
                Effect::Schedule(transition, after) => self.transitions.schedule(transition, after),
                Effect::CancelScheduled => {
                    self.transitions.cancel();
                }
                Effect::Evaluate(job) => self.spawn_evaluation(job),
                Effect::Disconnect(player_id) => {
                    if let Some(sender) = self.senders.remove(&player_id) {
                        let _ = sender.send(RoomOutbound::Close);
                    }
                }
            }
        }
    }

    /// Runs one submission on its own task and feeds the outcome back.
    fn spawn_evaluation(&self, job: EvaluationJob) {
        let evaluator = Arc::clone(&self.evaluator);
        let results = self.results_tx.clone();
        let room = Arc::clone(&self.name);
        tokio::spawn(async move {
            let EvaluationJob {
                submitter,
                activation,
                code_chars,
                submission,
            } = job;
            let verdict = evaluator.evaluate(submission).await;
            debug!(%room, player_id = %submitter, correct = verdict.is_correct(), "evaluation finished");
            let outcome = EvaluationOutcome {
                submitter,
                activation,
                code_chars,
                verdict,
            };
            if results.send(outcome).is_err() {
                debug!(%room, "room closed before evaluation finished");
            }
        });
    }

    /// Dispatches a server event to the correct recipients.
    fn dispatch(&self, recipient: Recipient, event: ServerEvent) {
        match recipient {
            Recipient::All => {
                for sender in self.senders.values() {
                    let _ = sender.send(RoomOutbound::Event(event.clone()));
                }
            }
            Recipient::Player(player_id) => {
                self.send_to(player_id, RoomOutbound::Event(event));
            }
            Recipient::AllExcept(excluded) => {
                for (player_id, sender) in &self.senders {
                    if *player_id != excluded {
                        let _ = sender.send(RoomOutbound::Event(event.clone()));
                    }
                }
            }
        }
    }

    /// Sends to a single player. Silently drops if the player is gone.
    fn send_to(&self, player_id: PlayerId, msg: RoomOutbound) {
        if let Some(sender) = self.senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    fn close_all(&mut self) {
        self.ticks.disarm();
        self.transitions.cancel();
        for (player_id, sender) in self.senders.drain() {
            if sender.send(RoomOutbound::Close).is_err() {
                warn!(room = %self.name, %player_id, "connection gone before room closed");
            }
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            name: self.name.to_string(),
            phase: self.machine.phase(),
            player_count: self.senders.len(),
            max_players: self.machine.config().max_players,
        }
    }
}

/// Spawns a new room actor task and returns a handle to it.
///
/// `channel_size` bounds both inbound channels; senders wait when a
/// room falls behind.
pub(crate) fn spawn_room<E: Evaluator>(
    name: &str,
    config: RoomConfig,
    catalog: Arc<LevelCatalog>,
    score_rules: ScoreRules,
    evaluator: Arc<E>,
    channel_size: usize,
) -> RoomHandle {
    let (control_tx, control_rx) = mpsc::channel(channel_size);
    let (actions_tx, actions_rx) = mpsc::channel(channel_size);
    let (results_tx, results_rx) = mpsc::unbounded_channel();
    let name: Arc<str> = Arc::from(name);

    let actor = RoomActor {
        name: Arc::clone(&name),
        machine: SessionMachine::new(config, catalog, score_rules),
        senders: HashMap::new(),
        evaluator,
        ticks: TickScheduler::with_period(TICK_PERIOD),
        transitions: Deadline::new(),
        control: control_rx,
        actions: actions_rx,
        results_tx,
        results_rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        name,
        control: control_tx,
        actions: actions_tx,
    }
}
