//! The question record and selection filter.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use quizforge_protocol::QuestionId;
use serde::{Deserialize, Serialize};

use crate::QuestionError;

/// Points for a correct answer when the source doesn't say otherwise.
pub const DEFAULT_POINTS: u32 = 10;
/// Answer window when the source doesn't say otherwise.
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 30;

fn default_points() -> u32 {
    DEFAULT_POINTS
}

fn default_time_limit() -> u64 {
    DEFAULT_TIME_LIMIT_SECS
}

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// How hard a question is. Serialized lowercase (`"easy"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

/// One trivia question. Immutable once it is in a bank.
///
/// The serde layout matches question files of the form
/// `{"id": "q1", "question": "...", "options": [...], "correct_answer": "...",
/// "time_limit": 30}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,

    #[serde(rename = "question")]
    pub prompt: String,

    /// Ordered answer options. At least two, all distinct.
    pub options: Vec<String>,

    /// Must be one of `options`.
    pub correct_answer: String,

    /// Shown during review, after the answer window closes.
    #[serde(default)]
    pub explanation: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub difficulty: Option<Difficulty>,

    /// Answer window in seconds. Must be greater than zero.
    #[serde(rename = "time_limit", default = "default_time_limit")]
    pub time_limit_secs: u64,

    /// Base points for a correct answer.
    #[serde(default = "default_points")]
    pub points: u32,
}

impl Question {
    /// The answer window as a `Duration`.
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }

    /// Judges an answer: trimmed, case-insensitive match against the
    /// correct option.
    pub fn is_correct(&self, answer: &str) -> bool {
        answer.trim().to_lowercase() == self.correct_answer.trim().to_lowercase()
    }

    /// Checks the per-record rules. Duplicate ids across records are
    /// checked by the bank.
    pub fn validate(&self) -> Result<(), QuestionError> {
        let invalid = |reason: &str| QuestionError::InvalidQuestionData {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.as_str().trim().is_empty() {
            return Err(invalid("id cannot be empty"));
        }
        if self.prompt.trim().is_empty() {
            return Err(invalid("prompt cannot be empty"));
        }
        if self.options.len() < 2 {
            return Err(invalid("needs at least two options"));
        }
        let mut seen = HashSet::with_capacity(self.options.len());
        if !self.options.iter().all(|o| seen.insert(o.trim().to_lowercase())) {
            return Err(invalid("options must be unique, ignoring case"));
        }
        if !self.options.iter().any(|o| o == &self.correct_answer) {
            return Err(invalid("correct answer is not one of the options"));
        }
        if self.time_limit_secs == 0 {
            return Err(invalid("time limit must be greater than zero"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// QuestionFilter
// ---------------------------------------------------------------------------

/// Optional constraints for selecting questions. The default matches
/// every question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionFilter {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

impl QuestionFilter {
    /// Matches any question.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    /// Returns `true` if `question` satisfies every set constraint.
    pub fn matches(&self, question: &Question) -> bool {
        let category_ok = match &self.category {
            Some(want) => question.category.as_deref() == Some(want.as_str()),
            None => true,
        };
        let difficulty_ok = match self.difficulty {
            Some(want) => question.difficulty == Some(want),
            None => true,
        };
        category_ok && difficulty_ok
    }
}

impl fmt::Display for QuestionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.category, self.difficulty) {
            (None, None) => f.write_str("any"),
            (Some(c), None) => write!(f, "category={c}"),
            (None, Some(d)) => write!(f, "difficulty={d}"),
            (Some(c), Some(d)) => write!(f, "category={c}, difficulty={d}"),
        }
    }
}
