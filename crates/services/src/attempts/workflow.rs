use std::sync::Arc;

use quiz_core::model::{
    ProgressDelta, QuestionBank, QuestionId, QuizPolicy, RawAnswer, Sitting, SittingId,
    SubmitOutcome, TimeRemaining,
};
use storage::repository::{
    AttemptRecordRepository, Completion, CompletionOutcome, QuizCatalog, SittingRepository,
    StorageError,
};

use super::{
    Actor, AnswerFormat, FinalizeOutcome, QuestionView, SittingLocks, zero_time,
};
use crate::Clock;
use crate::error::{QuizError, not_found};

const DEFAULT_MAX_RETRIES: u32 = 3;

/// The answer loop of a sitting: peek, submit, time left, finalize.
///
/// Every operation checks the time limit first and force-finalizes an expired
/// sitting before doing anything else.
#[derive(Clone)]
pub struct AttemptService {
    clock: Clock,
    catalog: Arc<dyn QuizCatalog>,
    sittings: Arc<dyn SittingRepository>,
    attempts: Arc<dyn AttemptRecordRepository>,
    locks: SittingLocks,
    max_retries: u32,
}

impl AttemptService {
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
            locks: SittingLocks::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// How many times a write lost to a concurrent change is re-evaluated.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// The question at the head of the queue, or `None` once every question
    /// has been answered and the sitting is waiting to be finalized.
    ///
    /// # Errors
    ///
    /// - `QuizError::AlreadyComplete` for a finalized sitting.
    /// - `QuizError::TimeExpired` after force-finalizing an expired sitting.
    /// - `QuizError::Forbidden` when `actor` does not own the sitting.
    pub async fn current_question(
        &self,
        actor: Actor,
        sitting_id: SittingId,
    ) -> Result<Option<QuestionView>, QuizError> {
        let (sitting, policy) = self.load_live(actor, sitting_id).await?;
        let Some(question_id) = sitting.current_question_id() else {
            return Ok(None);
        };
        let bank = self.bank(&policy).await?;
        let question = bank
            .get(question_id)
            .ok_or_else(|| QuizError::NotFound(format!("question {question_id}")))?;
        let progress = sitting.progress();

        Ok(Some(QuestionView {
            sitting_id,
            question_id,
            prompt: question.prompt().to_owned(),
            format: AnswerFormat::of(question.kind()),
            position: progress.answered + 1,
            total: progress.total,
            time_remaining: sitting.time_remaining(policy.time_limit(), self.clock.now()),
        }))
    }

    /// Server-side time left on the sitting, recomputed from its start time.
    /// An expired sitting is finalized as a side effect and reports zero.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::AlreadyComplete` for a finalized sitting.
    pub async fn time_remaining(
        &self,
        actor: Actor,
        sitting_id: SittingId,
    ) -> Result<TimeRemaining, QuizError> {
        match self.load_live(actor, sitting_id).await {
            Ok((sitting, policy)) => Ok(sitting.time_remaining(policy.time_limit(), self.clock.now())),
            Err(QuizError::TimeExpired(_)) => Ok(zero_time()),
            Err(err) => Err(err),
        }
    }

    /// Records an answer for the current question.
    ///
    /// # Errors
    ///
    /// - `QuizError::OutOfOrderAnswer` if `question_id` is not the queue head.
    /// - `QuizError::TimeExpired` if the time limit ran out; the sitting has been
    ///   finalized and the error carries its result.
    /// - `QuizError::AlreadyComplete` for a finalized sitting.
    /// - `QuizError::Contention` if concurrent writers kept winning.
    pub async fn submit_answer(
        &self,
        actor: Actor,
        sitting_id: SittingId,
        question_id: QuestionId,
        answer: RawAnswer,
    ) -> Result<SubmitOutcome, QuizError> {
        let _guard = self.locks.acquire(sitting_id).await;

        for _ in 0..=self.max_retries {
            let mut sitting = self.load_owned(actor, sitting_id).await?;
            let policy = self.policy(&sitting).await?;
            let now = self.clock.now();
            if sitting.is_time_expired(policy.time_limit(), now) {
                return Err(self.expire_locked(actor, sitting_id).await);
            }

            let bank = self.bank(&policy).await?;
            let revision = sitting.revision();
            let outcome = sitting.submit_answer(&policy, &bank, question_id, answer.clone(), now)?;
            if outcome.replayed {
                return Ok(outcome);
            }

            match self.sittings.save_progress(&sitting, revision).await {
                Ok(()) => {
                    tracing::debug!(%sitting_id, %question_id, remaining = outcome.remaining, "answer recorded");
                    return Ok(outcome);
                }
                Err(StorageError::Conflict) => {
                    tracing::warn!(%sitting_id, "sitting changed while answering; re-evaluating");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(QuizError::Contention)
    }

    /// Completes the sitting once every question is answered, or earlier if
    /// its time has run out.
    ///
    /// Repeated calls return the stored result and no events.
    ///
    /// # Errors
    ///
    /// - `QuizError::Incomplete` while questions remain and time has not expired.
    /// - `QuizError::NotFound` for an unknown sitting.
    /// - `QuizError::Forbidden` when `actor` does not own the sitting.
    pub async fn finalize(
        &self,
        actor: Actor,
        sitting_id: SittingId,
    ) -> Result<FinalizeOutcome, QuizError> {
        let _guard = self.locks.acquire(sitting_id).await;
        self.finalize_locked(actor, sitting_id).await
    }

    /// Finalizes a sitting found expired outside the answer loop (admission,
    /// sweeps) on behalf of its `owner`.
    pub(crate) async fn finalize_expired(
        &self,
        owner: Actor,
        sitting_id: SittingId,
    ) -> Result<FinalizeOutcome, QuizError> {
        let _guard = self.locks.acquire(sitting_id).await;
        let outcome = self.finalize_locked(owner, sitting_id).await?;
        if !outcome.is_repeat() {
            tracing::warn!(%sitting_id, learner_id = %owner.id, "time limit expired; sitting auto-submitted");
        }
        Ok(outcome)
    }

    async fn expire_locked(&self, actor: Actor, sitting_id: SittingId) -> QuizError {
        match self.finalize_locked(actor, sitting_id).await {
            Ok(outcome) => {
                tracing::warn!(%sitting_id, learner_id = %actor.id, "time limit expired; sitting auto-submitted");
                QuizError::TimeExpired(Box::new(outcome.result))
            }
            Err(err) => err,
        }
    }

    async fn finalize_locked(
        &self,
        actor: Actor,
        sitting_id: SittingId,
    ) -> Result<FinalizeOutcome, QuizError> {
        for _ in 0..=self.max_retries {
            if let Some(result) = self.attempts.get_record(sitting_id).await? {
                if result.learner_id != actor.id {
                    return Err(QuizError::Forbidden);
                }
                return Ok(FinalizeOutcome::repeat(result));
            }

            let mut sitting = match self.sittings.get_sitting(sitting_id).await {
                Ok(sitting) => sitting,
                Err(StorageError::NotFound) => {
                    // Discarded by a concurrent finalize after the ledger check above.
                    if self.attempts.get_record(sitting_id).await?.is_some() {
                        continue;
                    }
                    return Err(QuizError::NotFound(format!("sitting {sitting_id}")));
                }
                Err(err) => return Err(err.into()),
            };
            if sitting.learner_id() != actor.id {
                return Err(QuizError::Forbidden);
            }
            if sitting.is_complete() {
                // Completed by a concurrent writer whose ledger entry is not visible yet.
                continue;
            }

            let policy = self.policy(&sitting).await?;
            let bank = self.bank(&policy).await?;
            let revision = sitting.revision();
            let retained = sitting.is_retained_under(&policy);
            let result = sitting.finalize(&policy, &bank, self.clock.now(), retained)?;
            let delta = ProgressDelta::from_sitting(&sitting, &bank);

            let completion = Completion {
                sitting: &sitting,
                expected_revision: revision,
                result: &result,
                progress: &delta,
                discard_sitting: !retained,
            };
            match self.sittings.commit_completion(completion).await {
                Ok(CompletionOutcome::Recorded(result)) => {
                    tracing::info!(
                        %sitting_id,
                        learner_id = %result.learner_id,
                        quiz_id = %result.quiz_id,
                        attempt = result.attempt_number,
                        score = result.score_percent,
                        passed = result.passed,
                        forced = result.forced,
                        "sitting finalized"
                    );
                    return Ok(FinalizeOutcome::first_time(result));
                }
                Ok(CompletionOutcome::AlreadyRecorded(result)) => {
                    return Ok(FinalizeOutcome::repeat(result));
                }
                Err(StorageError::Conflict) => {
                    tracing::warn!(%sitting_id, "sitting changed while finalizing; re-evaluating");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(QuizError::Contention)
    }

    /// Loads an in-progress sitting owned by `actor`, finalizing it first if
    /// its time has expired.
    async fn load_live(
        &self,
        actor: Actor,
        sitting_id: SittingId,
    ) -> Result<(Sitting, QuizPolicy), QuizError> {
        let sitting = self.load_owned(actor, sitting_id).await?;
        let policy = self.policy(&sitting).await?;
        if sitting.is_time_expired(policy.time_limit(), self.clock.now()) {
            let _guard = self.locks.acquire(sitting_id).await;
            return Err(self.expire_locked(actor, sitting_id).await);
        }
        Ok((sitting, policy))
    }

    /// Loads a sitting owned by `actor` that is still in progress.
    async fn load_owned(&self, actor: Actor, sitting_id: SittingId) -> Result<Sitting, QuizError> {
        let sitting = match self.sittings.get_sitting(sitting_id).await {
            Ok(sitting) => sitting,
            Err(StorageError::NotFound) => {
                return match self.attempts.get_record(sitting_id).await? {
                    Some(result) if result.learner_id != actor.id => Err(QuizError::Forbidden),
                    Some(_) => Err(QuizError::AlreadyComplete),
                    None => Err(QuizError::NotFound(format!("sitting {sitting_id}"))),
                };
            }
            Err(err) => return Err(err.into()),
        };
        if sitting.learner_id() != actor.id {
            return Err(QuizError::Forbidden);
        }
        if sitting.is_complete() {
            return Err(QuizError::AlreadyComplete);
        }
        Ok(sitting)
    }

    async fn policy(&self, sitting: &Sitting) -> Result<QuizPolicy, QuizError> {
        self.catalog
            .get_policy(sitting.quiz_id())
            .await
            .map_err(not_found(format!("quiz {}", sitting.quiz_id())))
    }

    async fn bank(&self, policy: &QuizPolicy) -> Result<QuestionBank, QuizError> {
        Ok(QuestionBank::new(self.catalog.list_questions(policy.id()).await?))
    }
}
