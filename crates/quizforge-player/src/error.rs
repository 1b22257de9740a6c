//! Error types for the player layer.

use quizforge_protocol::PlayerId;

/// Errors that can occur during player registry operations.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// No player with this id is registered.
    #[error("player {0} not found")]
    NotFound(PlayerId),

    /// The name belongs to a player who is still connected.
    /// A disconnected holder of the name would have been reconnected instead.
    #[error("name {0:?} is already taken")]
    NameTaken(String),

    /// The display name failed validation.
    #[error("invalid player name: {0}")]
    InvalidName(String),
}
