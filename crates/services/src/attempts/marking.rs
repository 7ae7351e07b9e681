use std::sync::Arc;

use chrono::{DateTime, Utc};
use quiz_core::model::{LearnerId, QuestionBank, QuestionId, QuizId, SittingId, SittingResult};
use storage::repository::{AttemptRecordRepository, QuizCatalog, SittingRepository, StorageError};

use super::Actor;
use crate::error::{QuizError, not_found};

const MAX_MARKING_RETRIES: u32 = 3;

/// One retained, completed sitting awaiting or past human marking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkingEntry {
    pub sitting_id: SittingId,
    pub learner_id: LearnerId,
    pub attempt_number: u32,
    pub completed_at: Option<DateTime<Utc>>,
    pub correct: u32,
    pub ungraded: usize,
    pub incorrect: Vec<QuestionId>,
}

/// Staff review and correction of retained sittings.
#[derive(Clone)]
pub struct MarkingService {
    catalog: Arc<dyn QuizCatalog>,
    sittings: Arc<dyn SittingRepository>,
    attempts: Arc<dyn AttemptRecordRepository>,
}

impl MarkingService {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn QuizCatalog>,
        sittings: Arc<dyn SittingRepository>,
        attempts: Arc<dyn AttemptRecordRepository>,
    ) -> Self {
        Self {
            catalog,
            sittings,
            attempts,
        }
    }

    /// Retained completed sittings of a quiz, newest first, optionally for one learner.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Forbidden` for non-staff actors.
    pub async fn list_marking(
        &self,
        actor: Actor,
        quiz_id: QuizId,
        learner: Option<LearnerId>,
    ) -> Result<Vec<MarkingEntry>, QuizError> {
        if !actor.is_staff() {
            return Err(QuizError::Forbidden);
        }
        let sittings = self.sittings.list_completed(quiz_id).await?;
        Ok(sittings
            .into_iter()
            .filter(|s| learner.is_none_or(|l| s.learner_id() == l))
            .map(|s| MarkingEntry {
                sitting_id: s.id(),
                learner_id: s.learner_id(),
                attempt_number: s.attempt_number(),
                completed_at: s.completed_at(),
                correct: s.correct_count(),
                ungraded: s.ungraded().len(),
                incorrect: s.incorrect().iter().copied().collect(),
            })
            .collect())
    }

    /// Marks one answered question of a retained sitting as correct or
    /// incorrect and rewrites the stored result. Progress is left untouched.
    ///
    /// # Errors
    ///
    /// - `QuizError::Forbidden` for non-staff actors.
    /// - `QuizError::NotRetained` if the sitting was discarded.
    /// - `QuizError::Sitting` if the sitting is still in progress or the
    ///   question was never answered.
    pub async fn mark(
        &self,
        actor: Actor,
        sitting_id: SittingId,
        question_id: QuestionId,
        correct: bool,
    ) -> Result<SittingResult, QuizError> {
        if !actor.is_staff() {
            return Err(QuizError::Forbidden);
        }

        for _ in 0..=MAX_MARKING_RETRIES {
            let mut sitting = match self.sittings.get_sitting(sitting_id).await {
                Ok(sitting) => sitting,
                Err(StorageError::NotFound) => {
                    return match self.attempts.get_record(sitting_id).await? {
                        Some(_) => Err(QuizError::NotRetained(sitting_id)),
                        None => Err(QuizError::NotFound(format!("sitting {sitting_id}"))),
                    };
                }
                Err(err) => return Err(err.into()),
            };
            let policy = self
                .catalog
                .get_policy(sitting.quiz_id())
                .await
                .map_err(not_found(format!("quiz {}", sitting.quiz_id())))?;
            let bank = QuestionBank::new(self.catalog.list_questions(policy.id()).await?);

            let revision = sitting.revision();
            if !sitting.mark(question_id, correct).map_err(QuizError::Sitting)? {
                return Ok(sitting.result(&policy, &bank, true)?);
            }
            let result = sitting.result(&policy, &bank, true)?;
            match self.sittings.save_marking(&sitting, revision, &result).await {
                Ok(()) => {
                    tracing::info!(
                        %sitting_id,
                        %question_id,
                        correct,
                        marker = %actor.id,
                        score = result.score_percent,
                        "sitting re-marked"
                    );
                    return Ok(result);
                }
                Err(StorageError::Conflict) => {
                    tracing::warn!(%sitting_id, "sitting changed while marking; re-evaluating");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(QuizError::Contention)
    }
}
