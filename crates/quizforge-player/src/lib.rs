//! Connected-player bookkeeping for Quizforge.
//!
//! This crate owns everything the server knows about a player outside
//! of any single room:
//!
//! 1. **Identity**: a validated display name mapped to a stable
//!    [`PlayerId`](quizforge_protocol::PlayerId)
//! 2. **Presence**: [`PlayerStatus`] and last-activity tracking, used by
//!    the inactivity sweep
//! 3. **Per-game accumulators**: score and [`AnswerStats`], written by
//!    the room the player currently sits in
//!
//! # How it fits in the stack
//!
//! ```text
//! Room coordinator (above)  ← reads names, writes scores/status
//!     ↕
//! Player registry (this crate)
//!     ↕
//! Protocol (below)  ← PlayerId, ConnectionId
//! ```

mod error;
mod player;
mod registry;

pub use error::PlayerError;
pub use player::{AnswerStats, Player, PlayerStatus, validate_name};
pub use registry::{PlayerRegistry, SharedPlayers};
