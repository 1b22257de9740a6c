//! Trivia questions for Quizforge.
//!
//! - [`Question`]: one immutable question record
//! - [`QuestionBank`]: a validated, read-only set of questions with
//!   random and filtered selection
//! - [`QuestionFilter`]: optional category / difficulty constraints
//!
//! Banks are validated once at load time. After that every lookup is a
//! pure read, so one bank is shared by all rooms behind an `Arc`.

mod bank;
mod error;
mod question;

pub use bank::QuestionBank;
pub use error::QuestionError;
pub use question::{Difficulty, Question, QuestionFilter};
