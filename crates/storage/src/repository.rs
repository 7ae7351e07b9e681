use async_trait::async_trait;
use quiz_core::model::{
    CourseId, LearnerId, Progress, ProgressDelta, Question, QuizId, QuizPolicy,
    Sitting, SittingId, SittingResult,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("{count} active sittings for learner {learner_id} on quiz {quiz_id}")]
    DuplicateActive {
        learner_id: LearnerId,
        quiz_id: QuizId,
        count: usize,
    },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result of an atomic admission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The candidate sitting was stored, numbered after the attempts already used.
    Created(Sitting),
    /// An in-progress sitting already existed and is handed back unchanged.
    Resumed(Sitting),
    /// The ceiling has been reached.
    Exhausted { used: u32 },
}

/// Everything written when a sitting completes.
#[derive(Debug, Clone, Copy)]
pub struct Completion<'a> {
    pub sitting: &'a Sitting,
    /// Revision the sitting had when it was loaded.
    pub expected_revision: u32,
    pub result: &'a SittingResult,
    pub progress: &'a ProgressDelta,
    /// Remove the sitting row instead of storing its completed state.
    pub discard_sitting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Recorded(SittingResult),
    /// A result for this sitting already existed; nothing was written.
    AlreadyRecorded(SittingResult),
}

impl CompletionOutcome {
    #[must_use]
    pub fn result(&self) -> &SittingResult {
        match self {
            CompletionOutcome::Recorded(r) | CompletionOutcome::AlreadyRecorded(r) => r,
        }
    }

    #[must_use]
    pub fn into_result(self) -> SittingResult {
        match self {
            CompletionOutcome::Recorded(r) | CompletionOutcome::AlreadyRecorded(r) => r,
        }
    }
}

/// Quiz definitions: policies and their questions.
#[async_trait]
pub trait QuizCatalog: Send + Sync {
    /// Persist or update a quiz policy.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the policy cannot be stored.
    async fn upsert_policy(&self, policy: &QuizPolicy) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_policy(&self, id: QuizId) -> Result<QuizPolicy, StorageError>;

    /// Policies of a course ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_policies(&self, course_id: CourseId) -> Result<Vec<QuizPolicy>, StorageError>;

    /// Persist or update a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` while the question's quiz has an
    /// in-progress sitting or when the id already belongs to another quiz,
    /// `StorageError::NotFound` for an unknown quiz.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Questions of a quiz in authoring (id) order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_questions(&self, quiz_id: QuizId) -> Result<Vec<Question>, StorageError>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the enrollment cannot be stored.
    async fn enroll(&self, learner_id: LearnerId, course_id: CourseId) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn is_enrolled(&self, learner_id: LearnerId, course_id: CourseId) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_learners(&self, course_id: CourseId) -> Result<Vec<LearnerId>, StorageError>;
}

/// Sittings and their lifecycle writes.
#[async_trait]
pub trait SittingRepository: Send + Sync {
    /// Atomically checks the attempt ceiling, then resumes the learner's
    /// in-progress sitting or stores `candidate` as a new one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::DuplicateActive` if more than one in-progress
    /// sitting exists for the key, or other storage errors.
    async fn admit(&self, candidate: Sitting, attempt_ceiling: u32) -> Result<Admission, StorageError>;

    /// The in-progress sitting for a learner, quiz and course, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::DuplicateActive` when the key is not unique.
    async fn find_active(
        &self,
        learner_id: LearnerId,
        quiz_id: QuizId,
        course_id: CourseId,
    ) -> Result<Option<Sitting>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_sitting(&self, id: SittingId) -> Result<Sitting, StorageError>;

    /// Compare-and-swap write of an in-progress sitting.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the stored revision differs from
    /// `expected_revision` or the sitting is no longer in progress.
    async fn save_progress(&self, sitting: &Sitting, expected_revision: u32) -> Result<(), StorageError>;

    /// Writes a completion in one transaction: the sitting transition, the
    /// attempt record and the progress delta.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the sitting changed underneath.
    async fn commit_completion(&self, completion: Completion<'_>) -> Result<CompletionOutcome, StorageError>;

    /// Stores a re-marked completed sitting together with its updated result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on a revision mismatch.
    async fn save_marking(
        &self,
        sitting: &Sitting,
        expected_revision: u32,
        result: &SittingResult,
    ) -> Result<(), StorageError>;

    /// All in-progress sittings.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_active(&self) -> Result<Vec<Sitting>, StorageError>;

    /// Completed sittings retained for a quiz, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_completed(&self, quiz_id: QuizId) -> Result<Vec<Sitting>, StorageError>;
}

/// Read side of the attempt ledger: one result per completed sitting,
/// kept even when the sitting itself is discarded.
#[async_trait]
pub trait AttemptRecordRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_record(&self, sitting_id: SittingId) -> Result<Option<SittingResult>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn count_attempts(
        &self,
        learner_id: LearnerId,
        quiz_id: QuizId,
        course_id: CourseId,
    ) -> Result<u32, StorageError>;

    /// A learner's results on one quiz, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_for_learner(
        &self,
        learner_id: LearnerId,
        quiz_id: QuizId,
    ) -> Result<Vec<SittingResult>, StorageError>;

    /// Every result of a learner across quizzes, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_all_for_learner(&self, learner_id: LearnerId) -> Result<Vec<SittingResult>, StorageError>;

    /// Every result on a quiz, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_for_quiz(&self, quiz_id: QuizId) -> Result<Vec<SittingResult>, StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// A learner's progress; empty when nothing has been recorded.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn get_progress(&self, learner_id: LearnerId) -> Result<Progress, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

type ActiveKey = (LearnerId, QuizId, CourseId);

#[derive(Default)]
struct MemoryState {
    policies: BTreeMap<QuizId, QuizPolicy>,
    questions: BTreeMap<QuizId, BTreeMap<quiz_core::model::QuestionId, Question>>,
    enrollments: BTreeSet<(CourseId, LearnerId)>,
    sittings: HashMap<SittingId, Sitting>,
    records: Vec<SittingResult>,
    progress: HashMap<LearnerId, Progress>,
}

impl MemoryState {
    fn active_for(&self, key: ActiveKey) -> Result<Option<&Sitting>, StorageError> {
        let mut found = self.sittings.values().filter(|s| {
            !s.is_complete() && (s.learner_id(), s.quiz_id(), s.course_id()) == key
        });
        let first = found.next();
        let extra = found.count();
        if extra > 0 {
            return Err(StorageError::DuplicateActive {
                learner_id: key.0,
                quiz_id: key.1,
                count: extra + 1,
            });
        }
        Ok(first)
    }

    fn record_for(&self, sitting_id: SittingId) -> Option<&SittingResult> {
        self.records.iter().find(|r| r.sitting_id == sitting_id)
    }

    fn attempts_used(&self, key: ActiveKey) -> usize {
        self.records
            .iter()
            .filter(|r| (r.learner_id, r.quiz_id, r.course_id) == key)
            .count()
    }

    fn check_revision(&self, sitting: &Sitting, expected_revision: u32) -> Result<&Sitting, StorageError> {
        let stored = self.sittings.get(&sitting.id()).ok_or(StorageError::Conflict)?;
        if stored.revision() != expected_revision {
            return Err(StorageError::Conflict);
        }
        Ok(stored)
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// A single lock guards all tables, so every trait method is atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Inserts a sitting bypassing admission. Test support for corrupted states.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_sitting_unchecked(&self, sitting: Sitting) -> Result<(), StorageError> {
        self.lock()?.sittings.insert(sitting.id(), sitting);
        Ok(())
    }
}

#[async_trait]
impl QuizCatalog for InMemoryRepository {
    async fn upsert_policy(&self, policy: &QuizPolicy) -> Result<(), StorageError> {
        self.lock()?.policies.insert(policy.id(), policy.clone());
        Ok(())
    }

    async fn get_policy(&self, id: QuizId) -> Result<QuizPolicy, StorageError> {
        self.lock()?.policies.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_policies(&self, course_id: CourseId) -> Result<Vec<QuizPolicy>, StorageError> {
        Ok(self
            .lock()?
            .policies
            .values()
            .filter(|p| p.course_id() == course_id)
            .cloned()
            .collect())
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.policies.contains_key(&question.quiz_id()) {
            return Err(StorageError::NotFound);
        }
        let busy = guard
            .sittings
            .values()
            .any(|s| s.quiz_id() == question.quiz_id() && !s.is_complete());
        let owned_elsewhere = guard
            .questions
            .iter()
            .filter(|(quiz_id, _)| **quiz_id != question.quiz_id())
            .any(|(_, qs)| qs.contains_key(&question.id()));
        if busy || owned_elsewhere {
            return Err(StorageError::Conflict);
        }
        guard
            .questions
            .entry(question.quiz_id())
            .or_default()
            .insert(question.id(), question.clone());
        Ok(())
    }

    async fn list_questions(&self, quiz_id: QuizId) -> Result<Vec<Question>, StorageError> {
        Ok(self
            .lock()?
            .questions
            .get(&quiz_id)
            .map(|qs| qs.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn enroll(&self, learner_id: LearnerId, course_id: CourseId) -> Result<(), StorageError> {
        self.lock()?.enrollments.insert((course_id, learner_id));
        Ok(())
    }

    async fn is_enrolled(&self, learner_id: LearnerId, course_id: CourseId) -> Result<bool, StorageError> {
        Ok(self.lock()?.enrollments.contains(&(course_id, learner_id)))
    }

    async fn list_learners(&self, course_id: CourseId) -> Result<Vec<LearnerId>, StorageError> {
        Ok(self
            .lock()?
            .enrollments
            .iter()
            .filter(|(c, _)| *c == course_id)
            .map(|(_, l)| *l)
            .collect())
    }
}

#[async_trait]
impl SittingRepository for InMemoryRepository {
    async fn admit(&self, candidate: Sitting, attempt_ceiling: u32) -> Result<Admission, StorageError> {
        let mut guard = self.lock()?;
        let key = (candidate.learner_id(), candidate.quiz_id(), candidate.course_id());
        let used = u32::try_from(guard.attempts_used(key))
            .map_err(|_| StorageError::Serialization("attempt count overflow".into()))?;
        if used >= attempt_ceiling {
            return Ok(Admission::Exhausted { used });
        }
        if let Some(active) = guard.active_for(key)? {
            return Ok(Admission::Resumed(active.clone()));
        }
        let sitting = candidate.with_attempt_number(used + 1);
        guard.sittings.insert(sitting.id(), sitting.clone());
        Ok(Admission::Created(sitting))
    }

    async fn find_active(
        &self,
        learner_id: LearnerId,
        quiz_id: QuizId,
        course_id: CourseId,
    ) -> Result<Option<Sitting>, StorageError> {
        Ok(self.lock()?.active_for((learner_id, quiz_id, course_id))?.cloned())
    }

    async fn get_sitting(&self, id: SittingId) -> Result<Sitting, StorageError> {
        self.lock()?.sittings.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn save_progress(&self, sitting: &Sitting, expected_revision: u32) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let stored = guard.check_revision(sitting, expected_revision)?;
        if stored.is_complete() {
            return Err(StorageError::Conflict);
        }
        guard.sittings.insert(sitting.id(), sitting.clone());
        Ok(())
    }

    async fn commit_completion(&self, completion: Completion<'_>) -> Result<CompletionOutcome, StorageError> {
        let mut guard = self.lock()?;
        let sitting = completion.sitting;
        if let Some(existing) = guard.record_for(sitting.id()) {
            return Ok(CompletionOutcome::AlreadyRecorded(existing.clone()));
        }
        let stored = guard.check_revision(sitting, completion.expected_revision)?;
        if stored.is_complete() {
            return Err(StorageError::Conflict);
        }

        if completion.discard_sitting {
            guard.sittings.remove(&sitting.id());
        } else {
            guard.sittings.insert(sitting.id(), sitting.clone());
        }
        guard.records.push(completion.result.clone());
        if !completion.progress.is_empty() {
            guard
                .progress
                .entry(sitting.learner_id())
                .or_insert_with(|| Progress::new(sitting.learner_id()))
                .apply(completion.progress);
        }
        Ok(CompletionOutcome::Recorded(completion.result.clone()))
    }

    async fn save_marking(
        &self,
        sitting: &Sitting,
        expected_revision: u32,
        result: &SittingResult,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.check_revision(sitting, expected_revision)?;
        let record = guard
            .records
            .iter_mut()
            .find(|r| r.sitting_id == sitting.id())
            .ok_or(StorageError::NotFound)?;
        *record = result.clone();
        guard.sittings.insert(sitting.id(), sitting.clone());
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Sitting>, StorageError> {
        Ok(self
            .lock()?
            .sittings
            .values()
            .filter(|s| !s.is_complete())
            .cloned()
            .collect())
    }

    async fn list_completed(&self, quiz_id: QuizId) -> Result<Vec<Sitting>, StorageError> {
        let mut completed: Vec<_> = self
            .lock()?
            .sittings
            .values()
            .filter(|s| s.quiz_id() == quiz_id && s.is_complete())
            .cloned()
            .collect();
        completed.sort_by(|a, b| b.completed_at().cmp(&a.completed_at()));
        Ok(completed)
    }
}

#[async_trait]
impl AttemptRecordRepository for InMemoryRepository {
    async fn get_record(&self, sitting_id: SittingId) -> Result<Option<SittingResult>, StorageError> {
        Ok(self.lock()?.record_for(sitting_id).cloned())
    }

    async fn count_attempts(
        &self,
        learner_id: LearnerId,
        quiz_id: QuizId,
        course_id: CourseId,
    ) -> Result<u32, StorageError> {
        let used = self.lock()?.attempts_used((learner_id, quiz_id, course_id));
        u32::try_from(used).map_err(|_| StorageError::Serialization("attempt count overflow".into()))
    }

    async fn list_for_learner(
        &self,
        learner_id: LearnerId,
        quiz_id: QuizId,
    ) -> Result<Vec<SittingResult>, StorageError> {
        Ok(self
            .lock()?
            .records
            .iter()
            .filter(|r| r.learner_id == learner_id && r.quiz_id == quiz_id)
            .cloned()
            .collect())
    }

    async fn list_all_for_learner(&self, learner_id: LearnerId) -> Result<Vec<SittingResult>, StorageError> {
        Ok(self
            .lock()?
            .records
            .iter()
            .filter(|r| r.learner_id == learner_id)
            .cloned()
            .collect())
    }

    async fn list_for_quiz(&self, quiz_id: QuizId) -> Result<Vec<SittingResult>, StorageError> {
        Ok(self
            .lock()?
            .records
            .iter()
            .filter(|r| r.quiz_id == quiz_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(&self, learner_id: LearnerId) -> Result<Progress, StorageError> {
        Ok(self
            .lock()?
            .progress
            .get(&learner_id)
            .cloned()
            .unwrap_or_else(|| Progress::new(learner_id)))
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn QuizCatalog>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub sittings: Arc<dyn SittingRepository>,
    pub attempts: Arc<dyn AttemptRecordRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        Self {
            catalog: Arc::new(repo.clone()),
            enrollments: Arc::new(repo.clone()),
            sittings: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            progress: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{OrderingMode, QuestionBank, QuestionId, QuestionKind, RawAnswer};
    use quiz_core::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn policy() -> QuizPolicy {
        QuizPolicy::builder(QuizId::new(1), CourseId::new(1), "Memory")
            .attempt_ceiling(2)
            .build()
            .unwrap()
    }

    fn question(id: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            QuizId::new(1),
            "Is water wet?",
            "",
            QuestionKind::TrueFalse { answer: true },
        )
        .unwrap()
    }

    fn candidate(seed: u64) -> Sitting {
        let mut rng = StdRng::seed_from_u64(seed);
        Sitting::start(
            LearnerId::new(1),
            QuizId::new(1),
            CourseId::new(1),
            0,
            vec![QuestionId::new(1)],
            OrderingMode::Fixed,
            &mut rng,
            fixed_now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn admission_resumes_then_exhausts() {
        let repo = InMemoryRepository::new();
        let policy = policy();
        repo.upsert_policy(&policy).await.unwrap();
        repo.upsert_question(&question(1)).await.unwrap();
        let bank = QuestionBank::new(repo.list_questions(policy.id()).await.unwrap());

        for attempt in 1..=2 {
            let Admission::Created(mut sitting) = repo.admit(candidate(attempt), 2).await.unwrap() else {
                panic!("expected a new sitting");
            };
            assert_eq!(sitting.attempt_number(), u32::try_from(attempt).unwrap());
            let again = repo.admit(candidate(99), 2).await.unwrap();
            assert_eq!(again, Admission::Resumed(sitting.clone()));

            let revision = sitting.revision();
            sitting
                .submit_answer(&policy, &bank, QuestionId::new(1), RawAnswer::Boolean(true), fixed_now())
                .unwrap();
            let result = sitting.finalize(&policy, &bank, fixed_now(), false).unwrap();
            let outcome = repo
                .commit_completion(Completion {
                    sitting: &sitting,
                    expected_revision: revision,
                    result: &result,
                    progress: &ProgressDelta::default(),
                    discard_sitting: true,
                })
                .await
                .unwrap();
            assert!(matches!(outcome, CompletionOutcome::Recorded(_)));
        }

        assert_eq!(
            repo.admit(candidate(5), 2).await.unwrap(),
            Admission::Exhausted { used: 2 }
        );
        assert_eq!(
            repo.count_attempts(LearnerId::new(1), QuizId::new(1), CourseId::new(1))
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn stale_revision_is_a_conflict() {
        let repo = InMemoryRepository::new();
        let Admission::Created(sitting) = repo.admit(candidate(1), 1).await.unwrap() else {
            panic!("expected a new sitting");
        };
        let err = repo.save_progress(&sitting, sitting.revision() + 1).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn question_edits_are_rejected_while_a_sitting_is_open() {
        let repo = InMemoryRepository::new();
        repo.upsert_policy(&policy()).await.unwrap();
        repo.upsert_question(&question(1)).await.unwrap();
        repo.admit(candidate(1), 1).await.unwrap();
        let err = repo.upsert_question(&question(2)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn question_cannot_move_to_another_quiz() {
        let repo = InMemoryRepository::new();
        repo.upsert_policy(&policy()).await.unwrap();
        let other = QuizPolicy::builder(QuizId::new(2), CourseId::new(1), "Other")
            .build()
            .unwrap();
        repo.upsert_policy(&other).await.unwrap();
        repo.upsert_question(&question(1)).await.unwrap();

        let moved = Question::new(QuestionId::new(1), QuizId::new(2), "Moved?", "", QuestionKind::Essay)
            .unwrap();
        let err = repo.upsert_question(&moved).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert_eq!(repo.list_questions(QuizId::new(1)).await.unwrap(), vec![question(1)]);
        assert!(repo.list_questions(QuizId::new(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_active_sittings_are_reported() {
        let repo = InMemoryRepository::new();
        repo.insert_sitting_unchecked(candidate(1)).unwrap();
        repo.insert_sitting_unchecked(candidate(2)).unwrap();
        let err = repo
            .find_active(LearnerId::new(1), QuizId::new(1), CourseId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateActive { count: 2, .. }));
    }
}
