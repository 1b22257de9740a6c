//! Error types for the question bank.

use quizforge_protocol::QuestionId;

/// Errors that can occur while loading or querying a question bank.
#[derive(Debug, thiserror::Error)]
pub enum QuestionError {
    /// A question record broke a bank rule (too few options, correct
    /// answer missing from the options, duplicate id, ...).
    #[error("invalid question data for {id}: {reason}")]
    InvalidQuestionData { id: QuestionId, reason: String },

    /// No question matched the lookup.
    #[error("no question found: {0}")]
    NotFound(String),

    /// The question source is not valid JSON for a bank.
    #[error("malformed question source: {0}")]
    Parse(#[from] serde_json::Error),
}
