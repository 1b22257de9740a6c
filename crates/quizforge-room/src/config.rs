//! Room configuration and phase state machine.

use std::time::Duration;

use quizforge_questions::QuestionFilter;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Settings for one room's games.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Minimum players required to start, and to keep a game going.
    pub min_players: usize,

    /// Maximum players allowed in the room.
    pub max_players: usize,

    /// Questions drawn for each game. A bank with fewer matches yields a
    /// shorter game.
    pub questions_per_game: usize,

    /// Answer window for every question. `None` uses each question's own
    /// time limit.
    pub question_time_limit: Option<Duration>,

    /// Length of the pre-game countdown. Broadcast once per second.
    pub countdown: Duration,

    /// How long the review (correct answer + rankings) stays up.
    pub review: Duration,

    /// How long final results stay up before the room resets.
    pub end_grace: Duration,

    /// Extra points for the single fastest correct answer per question.
    pub speed_bonus: u32,

    /// Which questions the game draws from.
    pub question_filter: QuestionFilter,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 4,
            questions_per_game: 10,
            question_time_limit: None,
            countdown: Duration::from_secs(5),
            review: Duration::from_secs(3),
            end_grace: Duration::from_secs(10),
            speed_bonus: 5,
            question_filter: QuestionFilter::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// The phase a room is in.
///
/// ```text
///            ┌───────────── abort (below min) ─────────────┐
///            ▼                                             │
/// Waiting → Countdown → Question → Review → Question → … → Review → Ended
///    ▲                                                               │
///    └──────────────────────── grace elapsed ────────────────────────┘
/// ```
///
/// - **Waiting**: accepting joins and ready flags.
/// - **Countdown**: everyone was ready; counting down to question 1.
/// - **Question**: one question is open for answers.
/// - **Review**: answers judged, correct answer and rankings shown.
/// - **Ended**: final results shown, persistence triggered.
///
/// Internal errors bypass this table and force `Ended` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomPhase {
    Waiting,
    Countdown,
    Question,
    Review,
    Ended,
}

impl RoomPhase {
    /// Returns `true` if the room is accepting new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` while a game is running (countdown through review).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Countdown | Self::Question | Self::Review)
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        use RoomPhase::*;
        matches!(
            (self, target),
            (Waiting, Countdown)
                | (Countdown, Question)
                | (Countdown, Waiting)
                | (Question, Review)
                | (Question, Waiting)
                | (Review, Question)
                | (Review, Ended)
                | (Ended, Waiting)
        )
    }
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Countdown => write!(f, "Countdown"),
            Self::Question => write!(f, "Question"),
            Self::Review => write!(f, "Review"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_phase_can_transition_to_follows_game_loop() {
        assert!(RoomPhase::Waiting.can_transition_to(RoomPhase::Countdown));
        assert!(RoomPhase::Countdown.can_transition_to(RoomPhase::Question));
        assert!(RoomPhase::Question.can_transition_to(RoomPhase::Review));
        assert!(RoomPhase::Review.can_transition_to(RoomPhase::Question));
        assert!(RoomPhase::Review.can_transition_to(RoomPhase::Ended));
        assert!(RoomPhase::Ended.can_transition_to(RoomPhase::Waiting));
    }

    #[test]
    fn test_room_phase_abort_paths() {
        assert!(RoomPhase::Countdown.can_transition_to(RoomPhase::Waiting));
        assert!(RoomPhase::Question.can_transition_to(RoomPhase::Waiting));
        assert!(!RoomPhase::Review.can_transition_to(RoomPhase::Waiting));
    }

    #[test]
    fn test_room_phase_rejects_skips() {
        assert!(!RoomPhase::Waiting.can_transition_to(RoomPhase::Question));
        assert!(!RoomPhase::Question.can_transition_to(RoomPhase::Question));
        assert!(!RoomPhase::Question.can_transition_to(RoomPhase::Ended));
        assert!(!RoomPhase::Ended.can_transition_to(RoomPhase::Countdown));
    }

    #[test]
    fn test_room_phase_is_joinable() {
        assert!(RoomPhase::Waiting.is_joinable());
        assert!(!RoomPhase::Countdown.is_joinable());
        assert!(!RoomPhase::Question.is_joinable());
        assert!(!RoomPhase::Review.is_joinable());
        assert!(!RoomPhase::Ended.is_joinable());
    }

    #[test]
    fn test_room_phase_is_active() {
        assert!(!RoomPhase::Waiting.is_active());
        assert!(RoomPhase::Countdown.is_active());
        assert!(RoomPhase::Question.is_active());
        assert!(RoomPhase::Review.is_active());
        assert!(!RoomPhase::Ended.is_active());
    }

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.min_players, 2);
        assert_eq!(config.max_players, 4);
        assert_eq!(config.questions_per_game, 10);
        assert_eq!(config.countdown, Duration::from_secs(5));
        assert_eq!(config.review, Duration::from_secs(3));
        assert_eq!(config.speed_bonus, 5);
        assert!(config.question_time_limit.is_none());
    }
}
