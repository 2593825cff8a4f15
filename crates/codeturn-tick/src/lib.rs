//! Turn tick scheduling for Codeturn.
//!
//! Two timer primitives, both meant to sit inside a room actor's
//! `tokio::select!` loop so that timer events are serialized with every
//! other session event:
//!
//! - [`TickScheduler`]: a re-armable fixed-period tick (1 Hz by default)
//!   that drives the per-turn countdown. Arming always replaces the
//!   previous cadence, so at most one tick stream is live per scheduler.
//! - [`Deadline`]: a cancellable one-shot carrying a payload, used for the
//!   pause between levels and the return to the lobby after a game.
//!
//! While disarmed (or unscheduled), the `wait` futures pend forever and
//! `select!` simply keeps polling its other branches.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         biased;
//!         Some(cmd) = control_rx.recv() => { /* joins, leaves */ }
//!         fired = deadline.wait() => { /* scheduled transition */ }
//!         info = turn_clock.wait_for_tick() => { /* countdown */ }
//!         Some(action) = action_rx.recv() => { /* player actions */ }
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`TickScheduler`].
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks.
    pub period: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
        }
    }
}

impl TickConfig {
    /// Shortest period accepted; anything below is clamped.
    pub const MIN_PERIOD: Duration = Duration::from_millis(10);

    /// Create a config with the given period.
    pub fn with_period(period: Duration) -> Self {
        Self { period }
    }

    /// Clamp out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        if self.period < Self::MIN_PERIOD {
            warn!(
                period_ms = self.period.as_millis() as u64,
                min_ms = Self::MIN_PERIOD.as_millis() as u64,
                "tick period below minimum, clamping"
            );
            self.period = Self::MIN_PERIOD;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Ticks fired since the scheduler was last armed (starts at 1).
    pub tick: u64,
    /// How many times the scheduler has been armed. Lets callers tell
    /// ticks of one turn from ticks of the next.
    pub generation: u64,
    /// Whole periods skipped because the actor woke up late.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Re-armable fixed-period tick. One per room actor.
#[derive(Debug)]
pub struct TickScheduler {
    period: Duration,
    /// When the next tick should fire. `None` while disarmed.
    next_tick: Option<Instant>,
    tick_count: u64,
    generation: u64,
}

impl TickScheduler {
    /// Create a disarmed scheduler.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        debug!(period_ms = config.period.as_millis() as u64, "tick scheduler created");
        Self {
            period: config.period,
            next_tick: None,
            tick_count: 0,
            generation: 0,
        }
    }

    /// Create a disarmed scheduler with the given period.
    pub fn with_period(period: Duration) -> Self {
        Self::new(TickConfig::with_period(period))
    }

    /// Start (or restart) ticking: the first tick fires one period from now.
    ///
    /// Any cadence from a previous `arm` is discarded.
    pub fn arm(&mut self) {
        let now = Instant::now();
        self.generation += 1;
        self.tick_count = 0;
        self.next_tick = Some(now + self.period);
        trace!(generation = self.generation, "tick scheduler armed");
    }

    /// Stop ticking. `wait_for_tick` pends until the next [`arm`](Self::arm).
    ///
    /// Safe to call multiple times.
    pub fn disarm(&mut self) {
        if self.next_tick.take().is_some() {
            trace!(generation = self.generation, "tick scheduler disarmed");
        }
    }

    /// Wait until the next tick is due.
    ///
    /// While disarmed this future never resolves on its own.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(next) = self.next_tick else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(next);
        let ticks_skipped = (late_by.as_nanos() / self.period.as_nanos()) as u64;
        if ticks_skipped > 0 {
            warn!(
                generation = self.generation,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun, skipping ahead"
            );
        }

        self.tick_count += 1;
        // Keep the cadence anchored to the arm instant; skipped periods
        // are dropped rather than replayed.
        self.next_tick = Some(next + self.period * (ticks_skipped as u32 + 1));

        trace!(tick = self.tick_count, generation = self.generation, "tick fired");

        TickInfo {
            tick: self.tick_count,
            generation: self.generation,
            ticks_skipped,
        }
    }

    /// Whether a tick stream is currently live.
    pub fn is_armed(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Ticks fired since the last `arm`.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The fixed tick period.
    pub fn period(&self) -> Duration {
        self.period
    }
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

/// A cancellable one-shot timer carrying a payload.
///
/// Scheduling replaces whatever was pending; firing clears it.
#[derive(Debug)]
pub struct Deadline<T> {
    pending: Option<(Instant, T)>,
}

impl<T> Deadline<T> {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Fire `value` once `after` has elapsed, replacing any pending value.
    pub fn schedule(&mut self, value: T, after: Duration) {
        if self.pending.is_some() {
            debug!("replacing pending deadline");
        }
        self.pending = Some((Instant::now() + after, value));
    }

    /// Drop the pending value, if any. Returns it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, value)| value)
    }

    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value fires, if any.
    pub fn fires_at(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(at, _)| *at)
    }

    /// Wait for the pending value. Pends forever while nothing is scheduled.
    pub async fn wait(&mut self) -> T {
        let Some(at) = self.fires_at() else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(at).await;

        match self.pending.take() {
            Some((_, value)) => value,
            // Only reachable if `pending` changed under us, which needs
            // `&mut self` and so can't happen while this future is alive.
            None => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

impl<T> Default for Deadline<T> {
    fn default() -> Self {
        Self::new()
    }
}
