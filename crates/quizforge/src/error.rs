//! Unified error type for Quizforge.

use quizforge_player::PlayerError;
use quizforge_questions::QuestionError;
use quizforge_room::RoomError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `quizforge` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    /// A player-level error (unknown player, name taken, invalid name).
    #[error(transparent)]
    Player(#[from] PlayerError),

    /// A question-bank error (invalid data, nothing matches, bad JSON).
    #[error(transparent)]
    Question(#[from] QuestionError),

    /// A room-level error (full, not found, wrong phase, ...).
    #[error(transparent)]
    Room(#[from] RoomError),
}
