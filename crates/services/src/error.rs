//! Shared error types for the services crate.

use std::fmt;

use quiz_core::AvailabilityStatus;
use quiz_core::model::{
    CourseId, LearnerId, PolicyError, QuestionError, QuestionId, QuizId, SittingError,
    SittingId, SittingResult,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use thiserror::Error;

/// Why the gate refused an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotAvailableReason {
    Draft,
    Upcoming,
    Closed,
}

impl NotAvailableReason {
    /// `None` when the status admits attempts.
    #[must_use]
    pub fn from_status(status: AvailabilityStatus) -> Option<Self> {
        match status {
            AvailabilityStatus::Draft => Some(Self::Draft),
            AvailabilityStatus::Upcoming => Some(Self::Upcoming),
            AvailabilityStatus::Closed => Some(Self::Closed),
            AvailabilityStatus::Active => None,
        }
    }
}

impl fmt::Display for NotAvailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Draft => "draft",
            Self::Upcoming => "not open yet",
            Self::Closed => "closed",
        })
    }
}

/// Errors emitted by the quiz attempt services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz is not available: {reason}")]
    NotAvailable { reason: NotAvailableReason },

    #[error("quiz has no questions")]
    Empty,

    #[error("no attempts left ({used} of {ceiling} used)")]
    AttemptsExhausted { used: u32, ceiling: u32 },

    #[error("answer for question {submitted} submitted out of order")]
    OutOfOrderAnswer {
        expected: Option<QuestionId>,
        submitted: QuestionId,
    },

    #[error("sitting is already complete")]
    AlreadyComplete,

    #[error("time limit expired; the sitting was submitted automatically")]
    TimeExpired(Box<SittingResult>),

    #[error("learner {learner_id} is not enrolled in course {course_id}")]
    NotEnrolled {
        learner_id: LearnerId,
        course_id: CourseId,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("review is not available until the quiz closes or an attempt is completed")]
    ReviewUnavailable,

    #[error("sitting {0} was not retained after completion")]
    NotRetained(SittingId),

    #[error("operation not permitted for this actor")]
    Forbidden,

    #[error("{count} in-progress sittings for learner {learner_id} on quiz {quiz_id}")]
    DuplicateActiveSittings {
        learner_id: LearnerId,
        quiz_id: QuizId,
        count: usize,
    },

    #[error("{remaining} question(s) still unanswered")]
    Incomplete { remaining: usize },

    #[error("sitting changed concurrently too many times; retry the request")]
    Contention,

    #[error(transparent)]
    Question(#[from] QuestionError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Sitting(SittingError),

    #[error(transparent)]
    Storage(StorageError),
}

impl QuizError {
    /// Invariant violations that indicate a broken admission guarantee.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, QuizError::DuplicateActiveSittings { .. })
    }
}

impl From<SittingError> for QuizError {
    fn from(err: SittingError) -> Self {
        match err {
            SittingError::Empty => QuizError::Empty,
            SittingError::AlreadyComplete => QuizError::AlreadyComplete,
            SittingError::OutOfOrderAnswer {
                expected,
                submitted,
            } => QuizError::OutOfOrderAnswer {
                expected,
                submitted,
            },
            SittingError::QuestionsRemaining(remaining) => QuizError::Incomplete { remaining },
            other => QuizError::Sitting(other),
        }
    }
}

impl From<StorageError> for QuizError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateActive {
                learner_id,
                quiz_id,
                count,
            } => {
                tracing::error!(
                    %learner_id,
                    %quiz_id,
                    count,
                    "invariant violated: more than one in-progress sitting"
                );
                QuizError::DuplicateActiveSittings {
                    learner_id,
                    quiz_id,
                    count,
                }
            }
            other => QuizError::Storage(other),
        }
    }
}

/// Maps `StorageError::NotFound` to a `QuizError::NotFound` naming `what`.
pub(crate) fn not_found(what: impl fmt::Display) -> impl FnOnce(StorageError) -> QuizError {
    move |err| match err {
        StorageError::NotFound => QuizError::NotFound(what.to_string()),
        other => QuizError::from(other),
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
