//! Trivia rooms for Quizforge.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! members, phase, questions, answers and scoreboard, and drives the game
//! loop with a single cancellable phase timer.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates and tears down rooms, routes players,
//!   enforces one room per player
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomPhase`]: the game-loop state machine
//! - [`RoomConfig`]: player limits, questions per game, phase durations
//! - [`Scoreboard`] / [`score_answers`]: judging and ranking
//! - [`Notifier`] / [`Persistence`]: how a room reaches players and storage

mod config;
mod error;
mod hooks;
mod registry;
mod room;
mod scoreboard;

pub use config::{RoomConfig, RoomPhase};
pub use error::RoomError;
pub use hooks::{
    ChannelNotifier, NoPersistence, Notifier, NotifyError, Persistence, PersistenceError,
    PlayerStatsDelta,
};
pub use registry::{DEFAULT_CHANNEL_SIZE, RoomRegistry, RouteReply};
pub use room::{AnswerReceipt, RoomContext, RoomHandle, RoomStatus};
pub use scoreboard::{AnswerRecord, ScoredAnswer, Scoreboard, score_answers};
