use std::sync::Arc;

use quiz_core::gate;
use quiz_core::model::{
    QuestionBank, QuestionReport, QuizId, QuizPolicy, ReviewSheet, SittingId, SittingResult, answers_visible,
};
use quiz_core::AvailabilityStatus;
use storage::repository::{AttemptRecordRepository, QuizCatalog, SittingRepository, StorageError};

use super::Actor;
use crate::Clock;
use crate::error::{QuizError, not_found};

/// What a learner sees when revisiting a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewView {
    pub quiz_id: QuizId,
    pub title: String,
    pub status: AvailabilityStatus,
    pub show_answers: bool,
    /// Completed attempts, oldest first, without per-question detail.
    pub attempts: Vec<SittingResult>,
    /// Per-question answers of the latest attempt; only set when `show_answers`.
    ///
    /// Also `None` when that attempt belongs to an `Immediate` quiz and its
    /// sitting was discarded: feedback was given per answer and the ledger
    /// keeps no breakdown for such attempts.
    pub answers: Option<Vec<QuestionReport>>,
}

/// Read-only review of completed attempts. Never mutates a sitting.
#[derive(Clone)]
pub struct ReviewService {
    clock: Clock,
    catalog: Arc<dyn QuizCatalog>,
    sittings: Arc<dyn SittingRepository>,
    attempts: Arc<dyn AttemptRecordRepository>,
}

impl ReviewService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn QuizCatalog>,
        sittings: Arc<dyn SittingRepository>,
        attempts: Arc<dyn AttemptRecordRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            sittings,
            attempts,
        }
    }

    /// Review of `actor`'s attempts on a quiz.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ReviewUnavailable` while the quiz is not closed and
    /// the actor has no completed attempt.
    pub async fn review(&self, actor: Actor, quiz_id: QuizId) -> Result<ReviewView, QuizError> {
        let policy = self
            .catalog
            .get_policy(quiz_id)
            .await
            .map_err(not_found(format!("quiz {quiz_id}")))?;
        let now = self.clock.now();
        let status = gate::status(&policy, now);

        let attempts: Vec<SittingResult> = self
            .attempts
            .list_for_learner(actor.id, quiz_id)
            .await?
            .into_iter()
            .filter(|r| r.course_id == policy.course_id())
            .collect();
        let has_completed = !attempts.is_empty();
        if status != AvailabilityStatus::Closed && !has_completed {
            return Err(QuizError::ReviewUnavailable);
        }

        let show_answers = answers_visible(&policy, now, has_completed);
        let answers = match attempts.last() {
            Some(latest) if show_answers => self.latest_answers(&policy, latest).await?,
            _ => None,
        };

        Ok(ReviewView {
            quiz_id,
            title: policy.title().to_owned(),
            status,
            show_answers,
            attempts: attempts.iter().map(SittingResult::summary).collect(),
            answers,
        })
    }

    /// Full review of one retained sitting. Staff always see it; learners only
    /// their own and only while answers are visible.
    ///
    /// # Errors
    ///
    /// - `QuizError::NotRetained` if the sitting was discarded after completion.
    /// - `QuizError::ReviewUnavailable` for a sitting still in progress or while
    ///   answers are hidden from the learner.
    /// - `QuizError::Forbidden` for another learner's sitting.
    pub async fn sitting_review(
        &self,
        actor: Actor,
        sitting_id: SittingId,
    ) -> Result<ReviewSheet, QuizError> {
        let record = self.attempts.get_record(sitting_id).await?;
        let sitting = match self.sittings.get_sitting(sitting_id).await {
            Ok(sitting) => sitting,
            Err(StorageError::NotFound) if record.is_some() => {
                return Err(QuizError::NotRetained(sitting_id));
            }
            Err(StorageError::NotFound) => {
                return Err(QuizError::NotFound(format!("sitting {sitting_id}")));
            }
            Err(err) => return Err(err.into()),
        };
        if !actor.is_staff() && sitting.learner_id() != actor.id {
            return Err(QuizError::Forbidden);
        }
        let Some(record) = record else {
            return Err(QuizError::ReviewUnavailable);
        };

        let policy = self
            .catalog
            .get_policy(sitting.quiz_id())
            .await
            .map_err(not_found(format!("quiz {}", sitting.quiz_id())))?;
        if !actor.is_staff() && !answers_visible(&policy, self.clock.now(), true) {
            return Err(QuizError::ReviewUnavailable);
        }
        let bank = QuestionBank::new(self.catalog.list_questions(policy.id()).await?);
        Ok(ReviewSheet::build(&policy, &bank, &sitting, record.retained)?)
    }

    async fn latest_answers(
        &self,
        policy: &QuizPolicy,
        latest: &SittingResult,
    ) -> Result<Option<Vec<QuestionReport>>, QuizError> {
        if latest.retained {
            match self.sittings.get_sitting(latest.sitting_id).await {
                Ok(sitting) => {
                    let bank = QuestionBank::new(self.catalog.list_questions(policy.id()).await?);
                    let sheet = ReviewSheet::build(policy, &bank, &sitting, true)?;
                    return Ok(Some(sheet.items));
                }
                Err(StorageError::NotFound) => {}
                Err(err) => return Err(err.into()),
            }
        }
        if latest.breakdown.is_empty() {
            Ok(None)
        } else {
            Ok(Some(latest.breakdown.clone()))
        }
    }
}
