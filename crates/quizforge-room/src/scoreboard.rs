//! Per-room scoring and ranking.
//!
//! Two halves:
//!
//! - [`score_answers`] judges one question's [`AnswerRecord`]s and decides
//!   who gets points and who gets the speed bonus. Pure function.
//! - [`Scoreboard`] accumulates those results per player for one game and
//!   produces rankings and end-of-game statistics.
//!
//! Neither touches the network or the clock; the room actor feeds them
//! server-measured elapsed times.

use std::cmp::Ordering;
use std::time::Duration;

use quizforge_protocol::{AnswerOutcome, GameStatistics, PlayerId, ScoreboardEntry};
use quizforge_questions::Question;
use tokio::time::Instant;

use crate::PlayerStatsDelta;

// ---------------------------------------------------------------------------
// Answer records and judging
// ---------------------------------------------------------------------------

/// An accepted answer, as the room received it.
#[derive(Debug, Clone)]
pub struct AnswerRecord {
    pub player_id: PlayerId,
    pub answer: String,
    /// Receipt time minus question open time. Authoritative.
    pub elapsed: Duration,
    pub received_at: Instant,
}

/// A judged answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredAnswer {
    pub player_id: PlayerId,
    pub answer: String,
    pub correct: bool,
    /// Total points awarded, bonus included.
    pub points: u32,
    pub speed_bonus: bool,
    pub elapsed: Duration,
}

impl ScoredAnswer {
    /// Protocol form for review broadcasts.
    pub fn outcome(&self) -> AnswerOutcome {
        AnswerOutcome {
            player_id: self.player_id,
            answer: self.answer.clone(),
            correct: self.correct,
            points: self.points,
            speed_bonus: self.speed_bonus,
            elapsed_secs: self.elapsed.as_secs_f64(),
        }
    }
}

/// Judges one question's answers.
///
/// `answers` must be in submission order. Wrong answers score zero.
/// Correct answers score `question.points`, and the single fastest correct
/// answer also gets `speed_bonus`; when two correct answers have the same
/// elapsed time the earlier submission wins. Players who didn't answer
/// have no record and are not mentioned.
pub fn score_answers(
    question: &Question,
    answers: &[AnswerRecord],
    speed_bonus: u32,
) -> Vec<ScoredAnswer> {
    let judged: Vec<bool> = answers.iter().map(|a| question.is_correct(&a.answer)).collect();

    let mut fastest: Option<usize> = None;
    for (i, a) in answers.iter().enumerate() {
        if !judged[i] {
            continue;
        }
        // Strict `<` keeps the first submission on ties.
        if fastest.is_none_or(|f| a.elapsed < answers[f].elapsed) {
            fastest = Some(i);
        }
    }

    answers
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let correct = judged[i];
            let bonus = fastest == Some(i);
            let points = match (correct, bonus) {
                (false, _) => 0,
                (true, false) => question.points,
                (true, true) => question.points + speed_bonus,
            };
            ScoredAnswer {
                player_id: a.player_id,
                answer: a.answer.clone(),
                correct,
                points,
                speed_bonus: bonus,
                elapsed: a.elapsed,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Scoreboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct Tally {
    name: String,
    score: u32,
    correct: u32,
    answered: u32,
    total_response: Duration,
    fastest_correct: Option<Duration>,
}

impl Tally {
    fn average(&self) -> Option<Duration> {
        (self.answered > 0).then(|| self.total_response / self.answered)
    }
}

/// Running scores for one game, in seat order.
#[derive(Debug, Clone, Default)]
pub struct Scoreboard {
    seats: Vec<(PlayerId, Tally)>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seats a player with a zero tally. Re-seating an existing player
    /// is a no-op.
    pub fn add_player(&mut self, player_id: PlayerId, name: impl Into<String>) {
        if self.position(player_id).is_none() {
            self.seats.push((
                player_id,
                Tally {
                    name: name.into(),
                    ..Tally::default()
                },
            ));
        }
    }

    /// Drops a player's tally. Returns `true` if the player was seated.
    pub fn remove_player(&mut self, player_id: PlayerId) -> bool {
        match self.position(player_id) {
            Some(i) => {
                self.seats.remove(i);
                true
            }
            None => false,
        }
    }

    /// Folds one judged answer into the player's tally.
    ///
    /// Returns `false` (and logs) if the player isn't seated.
    pub fn record_answer(
        &mut self,
        player_id: PlayerId,
        is_correct: bool,
        response_time: Duration,
        points: u32,
    ) -> bool {
        let Some(i) = self.position(player_id) else {
            tracing::warn!(%player_id, "answer for unseated player ignored");
            return false;
        };
        let tally = &mut self.seats[i].1;
        tally.answered += 1;
        tally.total_response += response_time;
        tally.score = tally.score.saturating_add(points);
        if is_correct {
            tally.correct += 1;
            if tally.fastest_correct.is_none_or(|f| response_time < f) {
                tally.fastest_correct = Some(response_time);
            }
        }
        true
    }

    /// Current score of a seated player.
    pub fn score(&self, player_id: PlayerId) -> Option<u32> {
        self.position(player_id).map(|i| self.seats[i].1.score)
    }

    /// Players ordered by score (high first), then average response time
    /// (fast first; players with no answers last), then seat order.
    pub fn rankings(&self) -> Vec<ScoreboardEntry> {
        let mut order: Vec<&(PlayerId, Tally)> = self.seats.iter().collect();
        // Stable sort: seat order decides what the keys leave tied.
        order.sort_by(|(_, a), (_, b)| {
            b.score
                .cmp(&a.score)
                .then_with(|| cmp_average(a.average(), b.average()))
        });

        order
            .into_iter()
            .enumerate()
            .map(|(i, (player_id, t))| ScoreboardEntry {
                rank: i + 1,
                player_id: *player_id,
                name: t.name.clone(),
                score: t.score,
                correct: t.correct,
                answered: t.answered,
                fastest_secs: t.fastest_correct.map(|d| d.as_secs_f64()),
                average_secs: t.average().map(|d| d.as_secs_f64()),
                accuracy_pct: accuracy(t.correct, t.answered),
            })
            .collect()
    }

    /// The top-ranked player, if anyone is seated.
    pub fn leader(&self) -> Option<ScoreboardEntry> {
        self.rankings().into_iter().next()
    }

    /// Aggregates for the whole game.
    pub fn statistics(&self) -> GameStatistics {
        let players = self.seats.len();
        let total_score: u64 = self.seats.iter().map(|(_, t)| u64::from(t.score)).sum();
        let total_answers: u32 = self.seats.iter().map(|(_, t)| t.answered).sum();
        let total_correct: u32 = self.seats.iter().map(|(_, t)| t.correct).sum();
        let fastest = self
            .seats
            .iter()
            .filter_map(|(id, t)| t.fastest_correct.map(|f| (*id, f)))
            .min_by_key(|&(_, f)| f);

        GameStatistics {
            players,
            average_score: if players == 0 {
                0.0
            } else {
                total_score as f64 / players as f64
            },
            total_answers,
            accuracy_pct: accuracy(total_correct, total_answers),
            fastest_player: fastest.map(|(id, _)| id),
            fastest_secs: fastest.map(|(_, f)| f.as_secs_f64()),
        }
    }

    /// Each seated player's contribution to their lifetime stats.
    pub fn stats_deltas(&self, winner: Option<PlayerId>) -> Vec<(PlayerId, PlayerStatsDelta)> {
        self.seats
            .iter()
            .map(|(id, t)| {
                (
                    *id,
                    PlayerStatsDelta {
                        score: t.score,
                        correct: t.correct,
                        answered: t.answered,
                        total_response: t.total_response,
                        won: winner == Some(*id),
                    },
                )
            })
            .collect()
    }

    /// Zeroes every tally, keeping the seats.
    pub fn reset(&mut self) {
        for (_, tally) in &mut self.seats {
            *tally = Tally {
                name: std::mem::take(&mut tally.name),
                ..Tally::default()
            };
        }
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    fn position(&self, player_id: PlayerId) -> Option<usize> {
        self.seats.iter().position(|(id, _)| *id == player_id)
    }
}

fn cmp_average(a: Option<Duration>, b: Option<Duration>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn accuracy(correct: u32, answered: u32) -> f64 {
    if answered == 0 {
        0.0
    } else {
        f64::from(correct) * 100.0 / f64::from(answered)
    }
}

// =========================================================================
// Tests
// =========================================================================
