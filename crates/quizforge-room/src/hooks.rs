//! Outbound seams: how a room reaches players and storage.
//!
//! The room never touches a socket or a database. It calls:
//!
//! - a [`Notifier`] to deliver [`ServerEvent`]s, best-effort and
//!   non-blocking
//! - a [`Persistence`] backend to store results, fire-and-forget on a
//!   spawned task
//!
//! Both are traits so the transport and storage layers plug in their own
//! implementations. [`ChannelNotifier`] and [`NoPersistence`] cover tests,
//! demos and servers that don't store anything.

use std::collections::HashMap;
use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;

use quizforge_protocol::{PlayerId, RoomId, ScoreboardEntry, ServerEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// A delivery failure for one player.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The notifier has no connection registered for the player.
    #[error("no connection registered for player {0}")]
    NoConnection(PlayerId),

    /// The player's connection is gone.
    #[error("connection for player {0} is closed")]
    Closed(PlayerId),
}

/// Delivers server events to players.
///
/// Implementations must not block: the room actor calls these inline.
/// Queue the event (e.g. into a per-connection channel) and return.
/// Failures are logged by the room and otherwise ignored.
pub trait Notifier: Send + Sync + 'static {
    /// Sends an event to one player.
    fn unicast(&self, player_id: PlayerId, event: &ServerEvent) -> Result<(), NotifyError>;

    /// Sends an event to every player in `members`, a snapshot of the
    /// room's membership taken when the event was produced.
    ///
    /// The default fans out over [`unicast`](Self::unicast) and logs
    /// failures per player.
    fn broadcast(&self, room_id: RoomId, members: &[PlayerId], event: &ServerEvent) {
        for &player_id in members {
            if let Err(e) = self.unicast(player_id, event) {
                tracing::warn!(%room_id, %player_id, error = %e, "broadcast delivery failed");
            }
        }
    }
}

/// Per-player unbounded channels. Each registered player gets a receiver
/// that yields every event addressed to them.
#[derive(Debug, Default)]
pub struct ChannelNotifier {
    senders: RwLock<HashMap<PlayerId, mpsc::UnboundedSender<ServerEvent>>>,
}

impl ChannelNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the player's channel and returns its receiver.
    pub fn register(&self, player_id: PlayerId) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(player_id, tx);
        rx
    }

    /// Drops the player's channel. Returns `true` if one was registered.
    pub fn unregister(&self, player_id: PlayerId) -> bool {
        self.senders
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&player_id)
            .is_some()
    }
}

impl Notifier for ChannelNotifier {
    fn unicast(&self, player_id: PlayerId, event: &ServerEvent) -> Result<(), NotifyError> {
        let senders = self
            .senders
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let tx = senders
            .get(&player_id)
            .ok_or(NotifyError::NoConnection(player_id))?;
        tx.send(event.clone())
            .map_err(|_| NotifyError::Closed(player_id))
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// A storage failure. Logged by the room, never retried.
#[derive(Debug, thiserror::Error)]
#[error("persistence failed: {0}")]
pub struct PersistenceError(pub String);

/// One player's contribution from a finished game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatsDelta {
    pub score: u32,
    pub correct: u32,
    pub answered: u32,
    pub total_response: Duration,
    pub won: bool,
}

/// Stores game results. Called from a spawned task after each game.
///
/// Trait bounds mirror [`Notifier`]: the backend is shared by every room
/// for the life of the server.
pub trait Persistence: Send + Sync + 'static {
    /// Stores the final rankings of a finished game.
    fn save_game_result(
        &self,
        room_id: RoomId,
        final_rankings: &[ScoreboardEntry],
        duration: Duration,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Adds one game's results to a player's lifetime stats.
    fn save_player_stats(
        &self,
        player_id: PlayerId,
        delta: PlayerStatsDelta,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPersistence;

impl Persistence for NoPersistence {
    fn save_game_result(
        &self,
        _room_id: RoomId,
        _final_rankings: &[ScoreboardEntry],
        _duration: Duration,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send {
        std::future::ready(Ok(()))
    }

    fn save_player_stats(
        &self,
        _player_id: PlayerId,
        _delta: PlayerStatsDelta,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send {
        std::future::ready(Ok(()))
    }
}
