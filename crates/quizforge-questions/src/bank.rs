//! The question bank: a validated, read-only question set.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use quizforge_protocol::QuestionId;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::Deserialize;

use crate::{Difficulty, Question, QuestionError, QuestionFilter};

/// On-disk layout: `{"questions": [ ... ]}`.
#[derive(Deserialize)]
struct BankSource {
    questions: Vec<Question>,
}

/// A set of questions that passed validation.
///
/// Questions are stored behind `Arc` so a room can hold its drawn set
/// for a whole game without copying prompts and options around.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<Arc<Question>>,
    by_id: HashMap<QuestionId, usize>,
}

impl QuestionBank {
    /// Builds a bank, validating every record.
    ///
    /// # Errors
    /// [`QuestionError::InvalidQuestionData`] for the first record that
    /// breaks a rule, including an id that appears twice.
    pub fn from_questions(
        questions: impl IntoIterator<Item = Question>,
    ) -> Result<Self, QuestionError> {
        let mut bank = Self::default();
        for question in questions {
            question.validate()?;
            if bank.by_id.contains_key(&question.id) {
                return Err(QuestionError::InvalidQuestionData {
                    id: question.id,
                    reason: "duplicate question id".into(),
                });
            }
            bank.insert(question);
        }
        tracing::debug!(count = bank.len(), "question bank loaded");
        Ok(bank)
    }

    /// Parses and validates a JSON question source.
    pub fn from_json(source: &str) -> Result<Self, QuestionError> {
        let parsed: BankSource = serde_json::from_str(source)?;
        Self::from_questions(parsed.questions)
    }

    /// Reads, parses and validates a JSON question source.
    pub fn load(reader: impl Read) -> Result<Self, QuestionError> {
        let parsed: BankSource = serde_json::from_reader(reader)?;
        Self::from_questions(parsed.questions)
    }

    /// A small built-in bank, used when no source is configured.
    pub fn sample() -> Self {
        let mut bank = Self::default();
        for question in sample_questions() {
            bank.insert(question);
        }
        bank
    }

    /// Picks one question uniformly at random among those matching `filter`.
    pub fn random_question(
        &self,
        filter: &QuestionFilter,
    ) -> Result<Arc<Question>, QuestionError> {
        let matching: Vec<&Arc<Question>> = self.matching(filter).collect();
        matching
            .choose(&mut rand::rng())
            .map(|q| Arc::clone(q))
            .ok_or_else(|| QuestionError::NotFound(format!("no question matches filter {filter}")))
    }

    /// Looks up a question by id.
    pub fn by_id(&self, id: &QuestionId) -> Result<Arc<Question>, QuestionError> {
        self.by_id
            .get(id)
            .map(|&i| Arc::clone(&self.questions[i]))
            .ok_or_else(|| QuestionError::NotFound(format!("question {id}")))
    }

    /// Draws up to `count` distinct questions matching `filter`, in random order.
    ///
    /// Returns fewer than `count` when the bank doesn't have enough
    /// matches, and [`QuestionError::NotFound`] when it has none.
    pub fn draw(
        &self,
        count: usize,
        filter: &QuestionFilter,
    ) -> Result<Vec<Arc<Question>>, QuestionError> {
        let mut matching: Vec<Arc<Question>> =
            self.matching(filter).cloned().collect();
        if matching.is_empty() {
            return Err(QuestionError::NotFound(format!(
                "no question matches filter {filter}"
            )));
        }
        if matching.len() < count {
            tracing::debug!(
                wanted = count,
                available = matching.len(),
                %filter,
                "not enough questions, drawing all matches"
            );
        }
        matching.shuffle(&mut rand::rng());
        matching.truncate(count);
        Ok(matching)
    }

    /// All distinct categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<String> = self
            .questions
            .iter()
            .filter_map(|q| q.category.clone())
            .collect();
        cats.sort();
        cats.dedup();
        cats
    }

    /// Iterates over all questions in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Question>> {
        self.questions.iter()
    }

    /// Returns the number of questions.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Returns `true` if the bank has no questions.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    fn matching<'a>(
        &'a self,
        filter: &'a QuestionFilter,
    ) -> impl Iterator<Item = &'a Arc<Question>> + 'a {
        self.questions.iter().filter(move |q| filter.matches(q))
    }

    fn insert(&mut self, question: Question) {
        self.by_id.insert(question.id.clone(), self.questions.len());
        self.questions.push(Arc::new(question));
    }
}

#[allow(clippy::too_many_arguments)]
fn sample_question(
    id: &str,
    prompt: &str,
    options: &[&str],
    correct: &str,
    explanation: &str,
    category: &str,
    difficulty: Difficulty,
    time_limit_secs: u64,
) -> Question {
    Question {
        id: QuestionId::new(id),
        prompt: prompt.into(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer: correct.into(),
        explanation: Some(explanation.into()),
        category: Some(category.into()),
        difficulty: Some(difficulty),
        time_limit_secs,
        points: crate::question::DEFAULT_POINTS,
    }
}

fn sample_questions() -> Vec<Question> {
    vec![
        sample_question(
            "1",
            "What is the capital of Vietnam?",
            &["Hanoi", "Ho Chi Minh City", "Da Nang", "Hue"],
            "Hanoi",
            "Hanoi has been the capital of Vietnam since 1976.",
            "Geography",
            Difficulty::Easy,
            30,
        ),
        sample_question(
            "2",
            "Which planet is closest to the Sun?",
            &["Venus", "Mercury", "Earth", "Mars"],
            "Mercury",
            "Mercury orbits the Sun at about 58 million km.",
            "Science",
            Difficulty::Easy,
            30,
        ),
        sample_question(
            "3",
            "What is 2 + 2?",
            &["3", "4", "5", "6"],
            "4",
            "Basic addition: 2 + 2 = 4.",
            "Math",
            Difficulty::Easy,
            15,
        ),
        sample_question(
            "4",
            "What is the chemical symbol for gold?",
            &["Ag", "Au", "Gd", "Go"],
            "Au",
            "Au comes from the Latin word for gold, aurum.",
            "Science",
            Difficulty::Medium,
            20,
        ),
        sample_question(
            "5",
            "Which is the longest river in Africa?",
            &["Congo", "Niger", "Nile", "Zambezi"],
            "Nile",
            "The Nile runs roughly 6,650 km to the Mediterranean.",
            "Geography",
            Difficulty::Medium,
            20,
        ),
        sample_question(
            "6",
            "What is the square root of 144?",
            &["10", "11", "12", "14"],
            "12",
            "12 × 12 = 144.",
            "Math",
            Difficulty::Easy,
            15,
        ),
        sample_question(
            "7",
            "How many bits are in a byte?",
            &["4", "8", "16", "32"],
            "8",
            "A byte is eight bits on every mainstream architecture.",
            "Technology",
            Difficulty::Easy,
            15,
        ),
        sample_question(
            "8",
            "Which element has atomic number 1?",
            &["Helium", "Hydrogen", "Lithium", "Oxygen"],
            "Hydrogen",
            "Hydrogen has a single proton.",
            "Science",
            Difficulty::Hard,
            20,
        ),
    ]
}
