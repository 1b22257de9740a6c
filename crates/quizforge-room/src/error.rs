//! Error types for the room layer.
//!
//! Player-facing rejections (`RoomFull`, `AlreadyAnswered`, ...) are
//! ordinary values: the caller shows the `Display` text to the player and
//! moves on. `InternalTransition` is never returned to a player; the room
//! logs it and ends the game.

use quizforge_protocol::{PlayerId, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist. Rooms are only created by a join.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// No player slots left.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// Joins are only accepted while the room is waiting.
    #[error("room {0} has a game in progress")]
    GameInProgress(RoomId),

    /// No question is open (too early, too late, or between questions).
    #[error("no question is open for answers")]
    NotInQuestionPhase,

    /// The player already has an answer recorded for this question.
    #[error("player {0} already answered this question")]
    AlreadyAnswered(PlayerId),

    /// The player is not registered or not seated in this room.
    #[error("player {0} is not a member of this room")]
    UnknownPlayer(PlayerId),

    /// The player already sits in a room (this one or another).
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomId),

    /// The player does not sit in this room.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomId),

    /// The player does not sit in any room.
    #[error("player {0} is not in any room")]
    NoRoom(PlayerId),

    /// Removal refused because players are still seated.
    #[error("room {0} still has players")]
    NotEmpty(RoomId),

    /// The room's command channel is closed (room shut down).
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// A phase transition broke the state machine.
    #[error("internal transition error: {0}")]
    InternalTransition(String),
}
