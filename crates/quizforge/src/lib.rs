//! # Quizforge
//!
//! Real-time multiplayer trivia rooms.
//!
//! Players connect by name, gather in rooms, ready up, and play a timed
//! sequence of multiple-choice questions. The server measures every
//! response time itself, scores answers (with a speed bonus for the
//! fastest correct one), and keeps a live leaderboard per room.
//!
//! Each room is an isolated Tokio task; this crate wires rooms to the
//! player registry and the question bank and keeps the whole thing tidy
//! with periodic sweeps. Delivery ([`Notifier`](quizforge_room::Notifier))
//! and storage ([`Persistence`](quizforge_room::Persistence)) are plugged
//! in by the embedding application.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quizforge::prelude::*;
//!
//! # async fn run() -> Result<(), QuizError> {
//! quizforge::init_tracing();
//!
//! let notifier = Arc::new(ChannelNotifier::new());
//! let server = QuizServerBuilder::new()
//!     .questions(QuestionBank::sample())
//!     .build(Arc::clone(&notifier), Arc::new(NoPersistence));
//!
//! let alice = server.connect("alice", ConnectionId::new(1)).await?;
//! let mut events = notifier.register(alice);
//! server.handle(RoomId(1), ClientEvent::Join { player_id: alice }).await?;
//! # let _ = events.recv().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod server;

pub use error::QuizError;
pub use server::{QuizServer, QuizServerBuilder, ServerConfig};

pub use quizforge_player as player;
pub use quizforge_protocol as protocol;
pub use quizforge_questions as questions;
pub use quizforge_room as room;

/// Installs a `tracing` subscriber that prints to stderr.
///
/// The filter comes from `RUST_LOG` (e.g. `RUST_LOG=quizforge_room=debug`)
/// and defaults to `info`. Calling it more than once is harmless.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .compact()
        .try_init();
}

/// Common imports for embedding Quizforge.
pub mod prelude {
    pub use crate::{QuizError, QuizServer, QuizServerBuilder, ServerConfig};
    pub use quizforge_player::{PlayerError, PlayerStatus};
    pub use quizforge_protocol::{
        ClientEvent, ConnectionId, PlayerId, RoomId, ScoreboardEntry, ServerEvent,
    };
    pub use quizforge_questions::{Difficulty, Question, QuestionBank, QuestionFilter};
    pub use quizforge_room::{
        ChannelNotifier, NoPersistence, Notifier, Persistence, PersistenceError,
        PlayerStatsDelta, RoomConfig, RoomError, RoomPhase, RoomStatus, RouteReply,
    };
}
