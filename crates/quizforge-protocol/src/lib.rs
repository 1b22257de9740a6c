//! Shared vocabulary for Quizforge.
//!
//! This crate defines the types every other layer speaks:
//!
//! - **Identity** ([`PlayerId`], [`RoomId`], [`QuestionId`],
//!   [`ConnectionId`]): newtype handles that can't be mixed up.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): what players ask a
//!   room to do, and what a room tells its players.
//! - **Results** ([`ScoreboardEntry`], [`AnswerOutcome`],
//!   [`GameStatistics`]): the ranking and review payloads carried inside
//!   server events.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets or byte framing. A
//! transport turns its wire messages into [`ClientEvent`]s, and renders
//! [`ServerEvent`]s however it likes. Everything here derives serde so
//! that rendering is usually a one-liner.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Room coordinator
//! ```

mod events;
mod types;

pub use events::{
    AnswerOutcome, ClientEvent, GameStatistics, ScoreboardEntry, ServerEvent,
};
pub use types::{ConnectionId, PlayerId, QuestionId, RoomId};
