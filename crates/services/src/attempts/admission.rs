use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use quiz_core::gate;
use quiz_core::model::{Question, QuizId, QuizPolicy, Sitting};
use rand::SeedableRng;
use rand::rngs::StdRng;
use storage::repository::{Admission, EnrollmentRepository, QuizCatalog, SittingRepository};

use super::{Actor, AttemptService, SittingHandle};
use crate::Clock;
use crate::error::{NotAvailableReason, QuizError, not_found};

/// Entry point for starting or resuming a quiz attempt.
#[derive(Clone)]
pub struct AdmissionController {
    clock: Clock,
    catalog: Arc<dyn QuizCatalog>,
    enrollments: Arc<dyn EnrollmentRepository>,
    sittings: Arc<dyn SittingRepository>,
    attempts: AttemptService,
    shuffle_seed: Option<u64>,
    draws: Arc<AtomicU64>,
}

impl AdmissionController {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn QuizCatalog>,
        enrollments: Arc<dyn EnrollmentRepository>,
        sittings: Arc<dyn SittingRepository>,
        attempts: AttemptService,
    ) -> Self {
        Self {
            clock,
            catalog,
            enrollments,
            sittings,
            attempts,
            shuffle_seed: None,
            draws: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Seeds random question ordering deterministically; each sitting still
    /// gets its own stream derived from the seed. Without a seed every sitting
    /// draws from the thread RNG.
    #[must_use]
    pub fn with_shuffle_seed(mut self, seed: Option<u64>) -> Self {
        self.shuffle_seed = seed;
        self
    }

    /// Admits `actor` to `quiz_id`: resumes the in-progress sitting or creates
    /// the next attempt.
    ///
    /// Learners must be enrolled and the quiz must be open; staff skip both
    /// checks but not the attempt ceiling. An in-progress sitting whose time
    /// has run out is finalized and admission is re-evaluated.
    ///
    /// # Errors
    ///
    /// - `QuizError::NotEnrolled` for a learner outside the course.
    /// - `QuizError::NotAvailable` when the gate is not `Active`.
    /// - `QuizError::Empty` for a quiz without questions.
    /// - `QuizError::AttemptsExhausted` once the ceiling is reached.
    /// - `QuizError::DuplicateActiveSittings` if the uniqueness invariant is broken.
    pub async fn admit(&self, actor: Actor, quiz_id: QuizId) -> Result<SittingHandle, QuizError> {
        let policy = self
            .catalog
            .get_policy(quiz_id)
            .await
            .map_err(not_found(format!("quiz {quiz_id}")))?;

        if !actor.is_staff()
            && !self
                .enrollments
                .is_enrolled(actor.id, policy.course_id())
                .await?
        {
            return Err(QuizError::NotEnrolled {
                learner_id: actor.id,
                course_id: policy.course_id(),
            });
        }

        let now = self.clock.now();
        if !actor.is_staff() {
            if let Some(reason) = NotAvailableReason::from_status(gate::status(&policy, now)) {
                return Err(QuizError::NotAvailable { reason });
            }
        }

        let questions = self.catalog.list_questions(quiz_id).await?;
        if questions.is_empty() {
            return Err(QuizError::Empty);
        }

        // A second pass only happens after an expired sitting was finalized.
        for _ in 0..2 {
            let candidate = self.candidate(actor, &policy, &questions)?;
            match self.sittings.admit(candidate, policy.attempt_ceiling()).await? {
                Admission::Created(sitting) => {
                    tracing::info!(
                        sitting_id = %sitting.id(),
                        learner_id = %actor.id,
                        %quiz_id,
                        attempt = sitting.attempt_number(),
                        "sitting created"
                    );
                    return Ok(handle(&sitting, &policy, self.clock, false));
                }
                Admission::Resumed(sitting) => {
                    if sitting.is_time_expired(policy.time_limit(), self.clock.now()) {
                        self.attempts.finalize_expired(actor, sitting.id()).await?;
                        continue;
                    }
                    tracing::info!(sitting_id = %sitting.id(), learner_id = %actor.id, %quiz_id, "sitting resumed");
                    return Ok(handle(&sitting, &policy, self.clock, true));
                }
                Admission::Exhausted { used } => {
                    return Err(QuizError::AttemptsExhausted {
                        used,
                        ceiling: policy.attempt_ceiling(),
                    });
                }
            }
        }
        Err(QuizError::Contention)
    }

    fn candidate(
        &self,
        actor: Actor,
        policy: &QuizPolicy,
        questions: &[Question],
    ) -> Result<Sitting, QuizError> {
        let ids = questions.iter().map(Question::id).collect();
        let now = self.clock.now();
        let sitting = match self.shuffle_seed {
            Some(seed) => Sitting::start(
                actor.id,
                policy.id(),
                policy.course_id(),
                0,
                ids,
                policy.ordering(),
                &mut StdRng::seed_from_u64(
                    seed.wrapping_add(self.draws.fetch_add(1, Ordering::Relaxed)),
                ),
                now,
            ),
            None => Sitting::start(
                actor.id,
                policy.id(),
                policy.course_id(),
                0,
                ids,
                policy.ordering(),
                &mut rand::rng(),
                now,
            ),
        };
        Ok(sitting?.with_staff_preview(actor.is_staff()))
    }
}

fn handle(sitting: &Sitting, policy: &QuizPolicy, clock: Clock, resumed: bool) -> SittingHandle {
    SittingHandle {
        sitting_id: sitting.id(),
        quiz_id: sitting.quiz_id(),
        attempt_number: sitting.attempt_number(),
        resumed,
        progress: sitting.progress(),
        time_remaining: sitting.time_remaining(policy.time_limit(), clock.now()),
    }
}
