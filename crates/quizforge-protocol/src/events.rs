//! Events exchanged between players and a room.
//!
//! [`ClientEvent`]s flow inbound (a transport parsed something a player
//! sent); [`ServerEvent`]s flow outbound through the room's notifier.
//!
//! Both enums use `#[serde(tag = "type")]`, so an event renders as
//! `{ "type": "Countdown", "seconds_remaining": 3 }` rather than the
//! externally tagged `{ "Countdown": { ... } }`.

use serde::{Deserialize, Serialize};

use crate::{PlayerId, RoomId};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Something a player asks a room to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Take a seat in the room. Only accepted while the room is waiting.
    Join { player_id: PlayerId },

    /// Leave the room. Always accepted.
    Leave { player_id: PlayerId },

    /// Mark the player as ready to start.
    Ready { player_id: PlayerId },

    /// Submit an answer for the open question.
    ///
    /// `client_elapsed_secs` is what the client's own clock measured. The
    /// room records it for diagnostics only and scores with its own
    /// receipt time.
    Answer {
        player_id: PlayerId,
        answer: String,
        #[serde(default)]
        client_elapsed_secs: Option<f64>,
    },
}

impl ClientEvent {
    /// The player the event was sent on behalf of.
    pub fn player_id(&self) -> PlayerId {
        match self {
            Self::Join { player_id }
            | Self::Leave { player_id }
            | Self::Ready { player_id }
            | Self::Answer { player_id, .. } => *player_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Result payloads
// ---------------------------------------------------------------------------

/// One row of a room's ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreboardEntry {
    /// 1-based position in the ranking.
    pub rank: usize,
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
    /// Correct answers this game.
    pub correct: u32,
    /// Answers actually submitted this game (missed questions don't count).
    pub answered: u32,
    /// Fastest correct answer, in seconds.
    pub fastest_secs: Option<f64>,
    /// Mean response time over submitted answers, in seconds.
    pub average_secs: Option<f64>,
    /// `correct / answered` as a percentage; 0 when nothing was answered.
    pub accuracy_pct: f64,
}

/// How a single submitted answer was judged during review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub player_id: PlayerId,
    pub answer: String,
    pub correct: bool,
    /// Points awarded, speed bonus included.
    pub points: u32,
    pub speed_bonus: bool,
    /// Server-measured time from question open to receipt.
    pub elapsed_secs: f64,
}

/// Aggregate numbers for a finished game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStatistics {
    pub players: usize,
    pub average_score: f64,
    pub total_answers: u32,
    pub accuracy_pct: f64,
    pub fastest_player: Option<PlayerId>,
    pub fastest_secs: Option<f64>,
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Something a room tells one player or all of its members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    // -- Membership --
    PlayerJoined {
        room_id: RoomId,
        player_id: PlayerId,
        name: String,
        player_count: usize,
    },

    PlayerLeft {
        room_id: RoomId,
        player_id: PlayerId,
        player_count: usize,
    },

    PlayerReady {
        player_id: PlayerId,
        ready_count: usize,
        player_count: usize,
    },

    // -- Game flow --
    /// Everyone is ready; the countdown is about to begin.
    GameStarting { total_questions: usize },

    /// Sent once per second while counting down to the first question.
    Countdown { seconds_remaining: u64 },

    QuestionOpened {
        /// 1-based question number.
        number: usize,
        total: usize,
        prompt: String,
        options: Vec<String>,
        time_limit_secs: u64,
    },

    /// Unicast reply to an answer submission.
    AnswerAck {
        accepted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    QuestionReview {
        number: usize,
        correct_answer: String,
        explanation: Option<String>,
        outcomes: Vec<AnswerOutcome>,
        bonus_player: Option<PlayerId>,
        rankings: Vec<ScoreboardEntry>,
    },

    GameEnded {
        winner: Option<PlayerId>,
        final_rankings: Vec<ScoreboardEntry>,
        duration_secs: f64,
        statistics: GameStatistics,
    },

    /// The running game was abandoned (not enough players left).
    RoundAborted { reason: String },

    /// Scores were cleared after a finished game; the room is waiting again.
    RoomReset,

    /// The room hit an internal error and ended the game.
    ErrorOccurred { reason: String },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! JSON shape checks. Transports render these events directly, so
    //! the tag layout is part of the contract with clients.

    use super::*;

    #[test]
    fn test_client_answer_json_format() {
        let ev = ClientEvent::Answer {
            player_id: PlayerId(3),
            answer: "4".into(),
            client_elapsed_secs: Some(1.5),
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();

        assert_eq!(json["type"], "Answer");
        assert_eq!(json["player_id"], 3);
        assert_eq!(json["answer"], "4");
        assert_eq!(json["client_elapsed_secs"], 1.5);
    }

    #[test]
    fn test_client_answer_without_client_time_deserializes() {
        let json = r#"{"type": "Answer", "player_id": 1, "answer": "Paris"}"#;
        let ev: ClientEvent = serde_json::from_str(json).unwrap();

        assert_eq!(
            ev,
            ClientEvent::Answer {
                player_id: PlayerId(1),
                answer: "Paris".into(),
                client_elapsed_secs: None,
            }
        );
    }

    #[test]
    fn test_client_event_player_id_covers_every_variant() {
        let p = PlayerId(9);
        let events = [
            ClientEvent::Join { player_id: p },
            ClientEvent::Leave { player_id: p },
            ClientEvent::Ready { player_id: p },
            ClientEvent::Answer {
                player_id: p,
                answer: String::new(),
                client_elapsed_secs: None,
            },
        ];
        assert!(events.iter().all(|e| e.player_id() == p));
    }

    #[test]
    fn test_unknown_client_event_type_returns_error() {
        let unknown = r#"{"type": "Cheat", "player_id": 1}"#;
        let result: Result<ClientEvent, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }

    #[test]
    fn test_countdown_json_format() {
        let ev = ServerEvent::Countdown { seconds_remaining: 3 };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();

        assert_eq!(json["type"], "Countdown");
        assert_eq!(json["seconds_remaining"], 3);
    }

    #[test]
    fn test_answer_ack_omits_reason_when_accepted() {
        let ev = ServerEvent::AnswerAck {
            accepted: true,
            reason: None,
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();

        assert_eq!(json["accepted"], true);
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_question_opened_json_format() {
        let ev = ServerEvent::QuestionOpened {
            number: 1,
            total: 10,
            prompt: "What is 2 + 2?".into(),
            options: vec!["3".into(), "4".into()],
            time_limit_secs: 15,
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();

        assert_eq!(json["type"], "QuestionOpened");
        assert_eq!(json["options"], serde_json::json!(["3", "4"]));
        assert_eq!(json["time_limit_secs"], 15);
    }

    #[test]
    fn test_game_ended_carries_rankings() {
        let entry = ScoreboardEntry {
            rank: 1,
            player_id: PlayerId(1),
            name: "alice".into(),
            score: 15,
            correct: 1,
            answered: 1,
            fastest_secs: Some(2.0),
            average_secs: Some(2.0),
            accuracy_pct: 100.0,
        };
        let ev = ServerEvent::GameEnded {
            winner: Some(PlayerId(1)),
            final_rankings: vec![entry],
            duration_secs: 42.0,
            statistics: GameStatistics::default(),
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();

        assert_eq!(json["type"], "GameEnded");
        assert_eq!(json["winner"], 1);
        assert_eq!(json["final_rankings"][0]["name"], "alice");
        assert_eq!(json["final_rankings"][0]["rank"], 1);
    }

    #[test]
    fn test_room_reset_is_bare_tag() {
        let json = serde_json::to_string(&ServerEvent::RoomReset).unwrap();
        assert_eq!(json, r#"{"type":"RoomReset"}"#);
    }
}
