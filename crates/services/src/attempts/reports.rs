use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Duration;
use quiz_core::gate;
use quiz_core::model::{CourseId, LearnerId, Progress, QuizId, QuizPolicy, SittingResult};
use quiz_core::AvailabilityStatus;
use storage::repository::{
    AttemptRecordRepository, EnrollmentRepository, ProgressRepository, QuizCatalog,
};

use super::Actor;
use crate::Clock;
use crate::error::{QuizError, not_found};

/// One learner's standing on a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerResult {
    pub learner_id: LearnerId,
    pub attempts: u32,
    pub best: SittingResult,
}

impl LearnerResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.best.passed
    }
}

/// Staff-facing results for a quiz, best attempt per learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResults {
    pub quiz_id: QuizId,
    pub title: String,
    pub pass_mark: u8,
    pub learners: Vec<LearnerResult>,
}

impl QuizResults {
    #[must_use]
    pub fn total_learners(&self) -> usize {
        self.learners.len()
    }

    #[must_use]
    pub fn passed_learners(&self) -> usize {
        self.learners.iter().filter(|l| l.passed()).count()
    }
}

/// A row of the quiz list shown to an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizListing {
    pub quiz_id: QuizId,
    pub title: String,
    pub status: AvailabilityStatus,
    pub exam_paper: bool,
    pub attempts_used: u32,
    pub attempts_left: u32,
    pub best: Option<SittingResult>,
    pub time_until_available: Option<Duration>,
    pub time_until_expires: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReport {
    pub progress: Progress,
    /// Retained exam-paper attempts, most recent first.
    pub exam_attempts: Vec<SittingResult>,
}

/// Read-only aggregates over the attempt ledger.
#[derive(Clone)]
pub struct ReportService {
    clock: Clock,
    catalog: Arc<dyn QuizCatalog>,
    enrollments: Arc<dyn EnrollmentRepository>,
    attempts: Arc<dyn AttemptRecordRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ReportService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn QuizCatalog>,
        enrollments: Arc<dyn EnrollmentRepository>,
        attempts: Arc<dyn AttemptRecordRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            enrollments,
            attempts,
            progress,
        }
    }

    /// Completed attempts grouped by learner with the best attempt of each.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Forbidden` for non-staff actors.
    pub async fn quiz_results(&self, actor: Actor, quiz_id: QuizId) -> Result<QuizResults, QuizError> {
        if !actor.is_staff() {
            return Err(QuizError::Forbidden);
        }
        let policy = self.policy(quiz_id).await?;
        self.results_for(&policy).await
    }

    /// `quiz_results` for every quiz of a course, drafts included.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Forbidden` for non-staff actors.
    pub async fn course_report(
        &self,
        actor: Actor,
        course_id: CourseId,
    ) -> Result<Vec<QuizResults>, QuizError> {
        if !actor.is_staff() {
            return Err(QuizError::Forbidden);
        }
        let mut report = Vec::new();
        for policy in self.catalog.list_policies(course_id).await? {
            report.push(self.results_for(&policy).await?);
        }
        Ok(report)
    }

    /// A learner's completed attempts in a course, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Forbidden` when a learner asks for someone else's history.
    pub async fn attempt_history(
        &self,
        actor: Actor,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<SittingResult>, QuizError> {
        if !actor.is_staff() && actor.id != learner_id {
            return Err(QuizError::Forbidden);
        }
        let mut history: Vec<SittingResult> = self
            .attempts
            .list_all_for_learner(learner_id)
            .await?
            .into_iter()
            .filter(|r| r.course_id == course_id)
            .map(|r| r.summary())
            .collect();
        history.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(history)
    }

    /// Quizzes of a course as listed to `actor`. Learners must be enrolled and
    /// never see drafts.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotEnrolled` for a learner outside the course.
    pub async fn quiz_listing(
        &self,
        actor: Actor,
        course_id: CourseId,
    ) -> Result<Vec<QuizListing>, QuizError> {
        if !actor.is_staff() && !self.enrollments.is_enrolled(actor.id, course_id).await? {
            return Err(QuizError::NotEnrolled {
                learner_id: actor.id,
                course_id,
            });
        }

        let now = self.clock.now();
        let mut listing = Vec::new();
        for policy in self.catalog.list_policies(course_id).await? {
            let status = gate::status(&policy, now);
            if status == AvailabilityStatus::Draft && !actor.is_staff() {
                continue;
            }
            let results: Vec<SittingResult> = self
                .attempts
                .list_for_learner(actor.id, policy.id())
                .await?
                .into_iter()
                .filter(|r| r.course_id == course_id)
                .collect();
            let used = u32::try_from(results.len()).unwrap_or(u32::MAX);
            listing.push(QuizListing {
                quiz_id: policy.id(),
                title: policy.title().to_owned(),
                status,
                exam_paper: policy.is_exam_paper(),
                attempts_used: used,
                attempts_left: policy.attempt_ceiling().saturating_sub(used),
                best: SittingResult::best(&results).map(SittingResult::summary),
                time_until_available: gate::time_until_available(&policy, now),
                time_until_expires: gate::time_until_expires(&policy, now),
            });
        }
        Ok(listing)
    }

    /// Category progress plus retained exam-paper attempts.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Forbidden` when a learner asks for someone else's progress.
    pub async fn progress(&self, actor: Actor, learner_id: LearnerId) -> Result<ProgressReport, QuizError> {
        if !actor.is_staff() && actor.id != learner_id {
            return Err(QuizError::Forbidden);
        }
        let progress = self.progress.get_progress(learner_id).await?;

        let mut exam_flags: HashMap<QuizId, bool> = HashMap::new();
        let mut exam_attempts = Vec::new();
        for result in self.attempts.list_all_for_learner(learner_id).await? {
            if !result.retained {
                continue;
            }
            let is_exam = match exam_flags.get(&result.quiz_id) {
                Some(flag) => *flag,
                None => {
                    let flag = self.policy(result.quiz_id).await?.is_exam_paper();
                    exam_flags.insert(result.quiz_id, flag);
                    flag
                }
            };
            if is_exam {
                exam_attempts.push(result.summary());
            }
        }
        exam_attempts.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

        Ok(ProgressReport {
            progress,
            exam_attempts,
        })
    }

    async fn results_for(&self, policy: &QuizPolicy) -> Result<QuizResults, QuizError> {
        let mut by_learner: BTreeMap<LearnerId, Vec<SittingResult>> = BTreeMap::new();
        for result in self.attempts.list_for_quiz(policy.id()).await? {
            if result.course_id == policy.course_id() {
                by_learner.entry(result.learner_id).or_default().push(result);
            }
        }

        let learners = by_learner
            .into_iter()
            .filter_map(|(learner_id, results)| {
                let best = SittingResult::best(&results)?.summary();
                Some(LearnerResult {
                    learner_id,
                    attempts: u32::try_from(results.len()).unwrap_or(u32::MAX),
                    best,
                })
            })
            .collect();

        Ok(QuizResults {
            quiz_id: policy.id(),
            title: policy.title().to_owned(),
            pass_mark: policy.pass_mark(),
            learners,
        })
    }

    async fn policy(&self, quiz_id: QuizId) -> Result<QuizPolicy, QuizError> {
        self.catalog
            .get_policy(quiz_id)
            .await
            .map_err(not_found(format!("quiz {quiz_id}")))
    }
}
