//! Cancellable phase deadline timer for Quizforge rooms.
//!
//! A room is always in exactly one phase, and every timed phase
//! (countdown tick, question time limit, review pause, end-of-game grace)
//! ends at a single deadline. [`PhaseTimer`] holds that one deadline.
//!
//! # Disarmed timers pend forever
//!
//! When no deadline is armed, [`PhaseTimer::expired`] never resolves.
//! That makes the timer safe to leave in a `tokio::select!` branch
//! permanently; the room's command branch keeps running.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         biased;
//!         cmd = commands.recv() => { /* join, answer, leave, ... */ }
//!         fired = timer.expired() => { /* advance the phase */ }
//!     }
//! }
//! ```
//!
//! Cancelling is just [`PhaseTimer::cancel`]. Nothing polls in the
//! background, so an "everyone answered" shortcut only has to cancel and
//! move on.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::trace;

// ---------------------------------------------------------------------------
// Fired
// ---------------------------------------------------------------------------

/// Information about an expiry, returned by [`PhaseTimer::expired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// The arm generation that expired. Each call to `arm`/`arm_at`
    /// bumps the generation, so callers can tell which phase fired.
    pub generation: u64,
    /// The deadline that was reached.
    pub deadline: Instant,
    /// How far past the deadline the timer was actually observed.
    pub late_by: Duration,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Lifetime counters for a timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerMetrics {
    /// Total arms (including re-arms over a live deadline).
    pub armed: u64,
    /// Deadlines that were reached.
    pub fired: u64,
    /// Deadlines dropped by `cancel` or replaced by a re-arm.
    pub cancelled: u64,
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// A single-shot, re-armable deadline.
///
/// One `PhaseTimer` per room actor. It uses Tokio's clock, so tests with
/// `#[tokio::test(start_paused = true)]` drive it deterministically.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    deadline: Option<Instant>,
    generation: u64,
    metrics: TimerMetrics,
}

impl PhaseTimer {
    /// Creates a disarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to fire `after` from now. Replaces any pending deadline.
    ///
    /// Returns the new generation.
    pub fn arm(&mut self, after: Duration) -> u64 {
        self.arm_at(Instant::now() + after)
    }

    /// Arms the timer to fire at an absolute `deadline`.
    ///
    /// A deadline in the past fires on the next poll of [`expired`](Self::expired).
    pub fn arm_at(&mut self, deadline: Instant) -> u64 {
        if self.deadline.is_some() {
            self.metrics.cancelled += 1;
        }
        self.generation += 1;
        self.deadline = Some(deadline);
        self.metrics.armed += 1;
        trace!(
            generation = self.generation,
            in_ms = deadline
                .saturating_duration_since(Instant::now())
                .as_millis() as u64,
            "phase timer armed"
        );
        self.generation
    }

    /// Drops the pending deadline. Returns `true` if one was armed.
    pub fn cancel(&mut self) -> bool {
        match self.deadline.take() {
            Some(_) => {
                self.metrics.cancelled += 1;
                trace!(generation = self.generation, "phase timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Returns `true` while a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// The pending deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the pending deadline (zero once it has passed).
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Generation of the most recent arm.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Lifetime counters.
    pub fn metrics(&self) -> TimerMetrics {
        self.metrics
    }

    /// Waits for the pending deadline and disarms the timer.
    ///
    /// While disarmed this future pends forever. It only mutates the
    /// timer after the deadline is reached, so dropping it mid-wait (as
    /// `select!` does when another branch wins) leaves the timer armed.
    pub async fn expired(&mut self) -> TimerFired {
        let Some(deadline) = self.deadline else {
            return std::future::pending().await;
        };

        time::sleep_until(deadline).await;

        let late_by = Instant::now().saturating_duration_since(deadline);
        self.deadline = None;
        self.metrics.fired += 1;
        trace!(
            generation = self.generation,
            late_us = late_by.as_micros() as u64,
            "phase timer fired"
        );

        TimerFired {
            generation: self.generation,
            deadline,
            late_by,
        }
    }
}
