//! Attempt lifecycle: admission, the answer loop, finalization and the read
//! paths built on top of completed attempts.

mod admission;
mod locks;
mod marking;
mod reports;
mod review;
mod sweep;
mod workflow;

use chrono::Duration;
use quiz_core::model::{
    Choice, LearnerId, QuestionId, QuestionKind, QuizId, SittingId, SittingProgress,
    SittingResult, TimeRemaining,
};

pub use admission::AdmissionController;
pub use marking::{MarkingEntry, MarkingService};
pub use reports::{LearnerResult, ProgressReport, QuizListing, QuizResults, ReportService};
pub use review::{ReviewService, ReviewView};
pub use sweep::{ExpirySweeper, SweepReport};
pub use workflow::AttemptService;

pub(crate) use locks::SittingLocks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Learner,
    Staff,
}

/// Who is calling. Staff may preview quizzes and mark sittings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: LearnerId,
    pub role: Role,
}

impl Actor {
    #[must_use]
    pub fn learner(id: LearnerId) -> Self {
        Self {
            id,
            role: Role::Learner,
        }
    }

    #[must_use]
    pub fn staff(id: LearnerId) -> Self {
        Self {
            id,
            role: Role::Staff,
        }
    }

    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }
}

/// Side effects of a finalize, returned for the caller to log or forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    AttemptCompleted {
        sitting_id: SittingId,
        learner_id: LearnerId,
        quiz_id: QuizId,
        score_percent: u8,
        passed: bool,
    },
    AutoSubmitted {
        sitting_id: SittingId,
        learner_id: LearnerId,
        quiz_id: QuizId,
    },
    SittingDiscarded {
        sitting_id: SittingId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOutcome {
    pub result: SittingResult,
    /// Empty when the sitting had already been finalized.
    pub events: Vec<ActivityEvent>,
}

impl FinalizeOutcome {
    fn first_time(result: SittingResult) -> Self {
        let mut events = vec![ActivityEvent::AttemptCompleted {
            sitting_id: result.sitting_id,
            learner_id: result.learner_id,
            quiz_id: result.quiz_id,
            score_percent: result.score_percent,
            passed: result.passed,
        }];
        if result.forced {
            events.push(ActivityEvent::AutoSubmitted {
                sitting_id: result.sitting_id,
                learner_id: result.learner_id,
                quiz_id: result.quiz_id,
            });
        }
        if !result.retained {
            events.push(ActivityEvent::SittingDiscarded {
                sitting_id: result.sitting_id,
            });
        }
        Self { result, events }
    }

    fn repeat(result: SittingResult) -> Self {
        Self {
            result,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_repeat(&self) -> bool {
        self.events.is_empty()
    }
}

/// Handle returned by admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SittingHandle {
    pub sitting_id: SittingId,
    pub quiz_id: QuizId,
    pub attempt_number: u32,
    pub resumed: bool,
    pub progress: SittingProgress,
    pub time_remaining: TimeRemaining,
}

/// How a question expects to be answered. Never carries the correct answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerFormat {
    Choice(Vec<Choice>),
    TrueFalse,
    Text,
    Essay,
}

impl AnswerFormat {
    fn of(kind: &QuestionKind) -> Self {
        match kind {
            QuestionKind::MultipleChoice { choices, .. } => Self::Choice(choices.clone()),
            QuestionKind::TrueFalse { .. } => Self::TrueFalse,
            QuestionKind::FillInBlank { .. } => Self::Text,
            QuestionKind::Essay => Self::Essay,
        }
    }
}

/// The question currently at the head of a sitting's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView {
    pub sitting_id: SittingId,
    pub question_id: QuestionId,
    pub prompt: String,
    pub format: AnswerFormat,
    /// 1-based position in the served order.
    pub position: usize,
    pub total: usize,
    pub time_remaining: TimeRemaining,
}

impl QuestionView {
    #[must_use]
    pub fn seconds_left(&self) -> Option<i64> {
        self.time_remaining.seconds()
    }
}

pub(crate) fn zero_time() -> TimeRemaining {
    TimeRemaining::Limited(Duration::zero())
}
