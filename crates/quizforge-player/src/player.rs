//! Player types: the records the registry keeps per connected name.

use std::fmt;
use std::time::Duration;

use quizforge_protocol::{ConnectionId, PlayerId};
use tokio::time::Instant;

use crate::PlayerError;

/// Shortest accepted display name, in characters.
pub const MIN_NAME_LEN: usize = 2;
/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 20;

// ---------------------------------------------------------------------------
// PlayerStatus
// ---------------------------------------------------------------------------

/// Where a player is in the connect / play lifecycle.
///
/// ```text
///   Connected ──(ready)──→ Ready ──(game start)──→ Playing ──(game end)──→ Finished
///       ↑                                                                    │
///       └──────────────────────────(room reset)──────────────────────────────┘
///
///   any ──(transport drop)──→ Disconnected ──(same name connects)──→ Connected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Connected,
    Ready,
    Playing,
    Disconnected,
    Finished,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connected => "connected",
            Self::Ready => "ready",
            Self::Playing => "playing",
            Self::Disconnected => "disconnected",
            Self::Finished => "finished",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// AnswerStats
// ---------------------------------------------------------------------------

/// Running answer statistics for the current game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnswerStats {
    /// Answers actually submitted.
    pub answered: u32,
    /// Submitted answers that were correct.
    pub correct: u32,
    /// Sum of server-measured response times over submitted answers.
    pub total_response: Duration,
}

impl AnswerStats {
    /// Mean response time, or `None` before the first answer.
    pub fn average_response(&self) -> Option<Duration> {
        (self.answered > 0).then(|| self.total_response / self.answered)
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A player known to the server.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    /// Validated, trimmed display name. Unique across the registry.
    pub name: String,
    pub status: PlayerStatus,
    /// Score in the current game. Never decreases within a game.
    pub score: u32,
    pub stats: AnswerStats,
    /// The transport connection the player was last seen on.
    pub connection: ConnectionId,
    /// Last time the player did anything (connect, any routed event).
    pub last_activity: Instant,
}

impl Player {
    pub(crate) fn new(id: PlayerId, name: String, connection: ConnectionId) -> Self {
        Self {
            id,
            name,
            status: PlayerStatus::Connected,
            score: 0,
            stats: AnswerStats::default(),
            connection,
            last_activity: Instant::now(),
        }
    }

    /// Returns `true` if the player has been quiet for at least `timeout`.
    pub fn is_inactive(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() >= timeout
    }

    /// Clears score and stats ahead of a new game.
    pub fn reset_for_new_game(&mut self) {
        self.score = 0;
        self.stats = AnswerStats::default();
        if self.status != PlayerStatus::Disconnected {
            self.status = PlayerStatus::Connected;
        }
    }
}

/// Validates and normalizes a display name.
///
/// The name is trimmed, must be 2–20 characters, and may contain only
/// ASCII letters, digits, `_`, `-` and spaces.
pub fn validate_name(raw: &str) -> Result<String, PlayerError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(PlayerError::InvalidName("name cannot be empty".into()));
    }
    let len = name.chars().count();
    if len < MIN_NAME_LEN {
        return Err(PlayerError::InvalidName(format!(
            "name must be at least {MIN_NAME_LEN} characters"
        )));
    }
    if len > MAX_NAME_LEN {
        return Err(PlayerError::InvalidName(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' '))
    {
        return Err(PlayerError::InvalidName(
            "name may only contain letters, digits, '_', '-' and spaces".into(),
        ));
    }
    Ok(name.to_string())
}
