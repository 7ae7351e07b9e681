use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CategoryId, QuestionId, QuizId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("multiple choice question needs at least two choices")]
    TooFewChoices,

    #[error("duplicate choice id: {0}")]
    DuplicateChoice(ChoiceId),

    #[error("correct choice {0} is not one of the question's choices")]
    UnknownCorrectChoice(ChoiceId),

    #[error("fill-in-the-blank question needs a non-blank expected answer")]
    EmptyExpectedAnswer,

    #[error("answer cannot be interpreted for this question: {0}")]
    UnparseableAnswer(String),
}

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

/// Identifier of one choice inside a multiple choice question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChoiceId(String);

impl ChoiceId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub text: String,
}

impl Choice {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: ChoiceId::new(id),
            text: text.into(),
        }
    }
}

/// Answer exactly as submitted by the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawAnswer {
    Choice(ChoiceId),
    Boolean(bool),
    Text(String),
}

impl fmt::Display for RawAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawAnswer::Choice(id) => write!(f, "{id}"),
            RawAnswer::Boolean(true) => f.write_str("True"),
            RawAnswer::Boolean(false) => f.write_str("False"),
            RawAnswer::Text(text) => f.write_str(text),
        }
    }
}

/// Outcome of validating one answer.
///
/// `Ungraded` is reserved for essays, which are never scored automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
    Correct,
    Incorrect,
    Ungraded,
}

impl Correctness {
    #[must_use]
    pub fn from_bool(correct: bool) -> Self {
        if correct {
            Self::Correct
        } else {
            Self::Incorrect
        }
    }

    #[must_use]
    pub fn is_correct(self) -> bool {
        matches!(self, Self::Correct)
    }

    #[must_use]
    pub fn is_graded(self) -> bool {
        !matches!(self, Self::Ungraded)
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Per-variant correctness data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice {
        choices: Vec<Choice>,
        correct: ChoiceId,
    },
    TrueFalse {
        answer: bool,
    },
    FillInBlank {
        expected: String,
        case_sensitive: bool,
    },
    Essay,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice { .. } => "multiple_choice",
            QuestionKind::TrueFalse { .. } => "true_false",
            QuestionKind::FillInBlank { .. } => "fill_in_blank",
            QuestionKind::Essay => "essay",
        }
    }
}

/// A single authored question. Read-only to the attempt engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    quiz_id: QuizId,
    category: Option<CategoryId>,
    prompt: String,
    explanation: String,
    kind: QuestionKind,
}

impl Question {
    /// Creates a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the prompt is blank or the variant data is
    /// inconsistent (unknown correct choice, duplicate choices, blank expected text).
    pub fn new(
        id: QuestionId,
        quiz_id: QuizId,
        prompt: impl Into<String>,
        explanation: impl Into<String>,
        kind: QuestionKind,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }

        match &kind {
            QuestionKind::MultipleChoice { choices, correct } => {
                if choices.len() < 2 {
                    return Err(QuestionError::TooFewChoices);
                }
                let mut seen = HashSet::new();
                for choice in choices {
                    if !seen.insert(&choice.id) {
                        return Err(QuestionError::DuplicateChoice(choice.id.clone()));
                    }
                }
                if !seen.contains(correct) {
                    return Err(QuestionError::UnknownCorrectChoice(correct.clone()));
                }
            }
            QuestionKind::FillInBlank { expected, .. } if expected.trim().is_empty() => {
                return Err(QuestionError::EmptyExpectedAnswer);
            }
            _ => {}
        }

        Ok(Self {
            id,
            quiz_id,
            category: None,
            prompt,
            explanation: explanation.into(),
            kind,
        })
    }

    #[must_use]
    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn category(&self) -> Option<CategoryId> {
        self.category
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    #[must_use]
    pub fn is_essay(&self) -> bool {
        matches!(self.kind, QuestionKind::Essay)
    }

    /// Validates a submitted answer against this question's correctness rule.
    ///
    /// An answer of the wrong shape for the variant is incorrect, never an error.
    #[must_use]
    pub fn is_correct(&self, raw: &RawAnswer) -> Correctness {
        match (&self.kind, raw) {
            (QuestionKind::Essay, _) => Correctness::Ungraded,
            (QuestionKind::MultipleChoice { correct, .. }, RawAnswer::Choice(given)) => {
                Correctness::from_bool(given == correct)
            }
            (QuestionKind::TrueFalse { answer }, RawAnswer::Boolean(given)) => {
                Correctness::from_bool(given == answer)
            }
            (
                QuestionKind::FillInBlank {
                    expected,
                    case_sensitive,
                },
                RawAnswer::Text(given),
            ) => Correctness::from_bool(blank_matches(expected, given, *case_sensitive)),
            _ => Correctness::Incorrect,
        }
    }

    /// Human readable form of the expected answer, `None` for essays.
    #[must_use]
    pub fn correct_answer_text(&self) -> Option<String> {
        match &self.kind {
            QuestionKind::MultipleChoice { choices, correct } => choices
                .iter()
                .find(|c| &c.id == correct)
                .map(|c| format!("{}) {}", c.id, c.text)),
            QuestionKind::TrueFalse { answer } => Some(RawAnswer::Boolean(*answer).to_string()),
            QuestionKind::FillInBlank { expected, .. } => Some(expected.trim().to_owned()),
            QuestionKind::Essay => None,
        }
    }

    /// Interprets free-form input (a form field, a terminal line) as an answer
    /// of the shape this question expects.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::UnparseableAnswer` for an unknown choice id or a
    /// value that is not recognisably true/false.
    pub fn parse_answer(&self, input: &str) -> Result<RawAnswer, QuestionError> {
        let trimmed = input.trim();
        match &self.kind {
            QuestionKind::MultipleChoice { choices, .. } => choices
                .iter()
                .find(|c| c.id.as_str().eq_ignore_ascii_case(trimmed))
                .map(|c| RawAnswer::Choice(c.id.clone()))
                .ok_or_else(|| QuestionError::UnparseableAnswer(trimmed.to_owned())),
            QuestionKind::TrueFalse { .. } => match trimmed.to_ascii_lowercase().as_str() {
                "t" | "true" | "yes" | "y" => Ok(RawAnswer::Boolean(true)),
                "f" | "false" | "no" | "n" => Ok(RawAnswer::Boolean(false)),
                _ => Err(QuestionError::UnparseableAnswer(trimmed.to_owned())),
            },
            QuestionKind::FillInBlank { .. } | QuestionKind::Essay => {
                Ok(RawAnswer::Text(input.to_owned()))
            }
        }
    }
}

fn blank_matches(expected: &str, given: &str, case_sensitive: bool) -> bool {
    let expected = expected.trim();
    let given = given.trim();
    if case_sensitive {
        expected == given
    } else {
        expected.to_lowercase() == given.to_lowercase()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
