use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::model::ids::{CourseId, LearnerId, QuestionId, QuizId, SittingId};
use crate::model::policy::{OrderingMode, QuizPolicy, RevealMode};
use crate::model::question::{Correctness, Question, RawAnswer};
use crate::model::result::{QuestionReport, SittingResult, score_percent};
use crate::time::saturating_until;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SittingError {
    #[error("quiz has no questions")]
    Empty,

    #[error("sitting is already complete")]
    AlreadyComplete,

    #[error("sitting is not complete yet")]
    NotComplete,

    #[error("time limit has expired")]
    TimeExpired,

    #[error("answer for {submitted} submitted out of order (current question: {expected:?})")]
    OutOfOrderAnswer {
        expected: Option<QuestionId>,
        submitted: QuestionId,
    },

    #[error("{0} question(s) still unanswered")]
    QuestionsRemaining(usize),

    #[error("question {0} is not part of this sitting's snapshot")]
    UnknownQuestion(QuestionId),

    #[error("question {0} was not answered in this sitting")]
    NotAnswered(QuestionId),

    #[error("invalid persisted sitting: {0}")]
    InvalidPersistedState(String),
}

//
// ─── SUPPORT TYPES ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SittingState {
    InProgress,
    Complete,
}

/// Remaining time on a sitting's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRemaining {
    Unbounded,
    Limited(Duration),
}

impl TimeRemaining {
    #[must_use]
    pub fn is_exhausted(self) -> bool {
        matches!(self, TimeRemaining::Limited(left) if left <= Duration::zero())
    }

    #[must_use]
    pub fn seconds(self) -> Option<i64> {
        match self {
            TimeRemaining::Unbounded => None,
            TimeRemaining::Limited(left) => Some(left.num_seconds()),
        }
    }
}

/// Aggregated view of sitting progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SittingProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

/// Correctness details shown to the learner right after answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub correctness: Correctness,
    pub correct_answer: Option<String>,
    pub explanation: String,
}

/// What `submit_answer` reports back.
///
/// `feedback` is only ever populated for `RevealMode::Immediate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub question_id: QuestionId,
    pub replayed: bool,
    pub feedback: Option<Feedback>,
    pub remaining: usize,
}

impl SubmitOutcome {
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.remaining > 0
    }
}

/// Questions a sitting may consult, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: HashMap<QuestionId, Question>,
    order: Vec<QuestionId>,
}

impl QuestionBank {
    /// Builds a bank keeping the authoring order of `questions`.
    #[must_use]
    pub fn new(questions: Vec<Question>) -> Self {
        let order = questions.iter().map(Question::id).collect();
        let questions = questions.into_iter().map(|q| (q.id(), q)).collect();
        Self { questions, order }
    }

    #[must_use]
    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.questions.get(&id)
    }

    /// Question ids in authoring order.
    #[must_use]
    pub fn ids(&self) -> &[QuestionId] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn require(&self, id: QuestionId) -> Result<&Question, SittingError> {
        self.get(id).ok_or(SittingError::UnknownQuestion(id))
    }
}

/// Persisted shape of a sitting, used by storage adapters to rehydrate one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSitting {
    pub id: SittingId,
    pub learner_id: LearnerId,
    pub quiz_id: QuizId,
    pub course_id: CourseId,
    pub attempt_number: u32,
    pub question_order: Vec<QuestionId>,
    pub remaining: Vec<QuestionId>,
    pub answers: BTreeMap<QuestionId, RawAnswer>,
    pub incorrect: BTreeSet<QuestionId>,
    pub ungraded: BTreeSet<QuestionId>,
    pub correct_count: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub forced: bool,
    pub staff_preview: bool,
    pub revision: u32,
}

//
// ─── SITTING ───────────────────────────────────────────────────────────────────
//

/// One learner's attempt at a quiz.
///
/// The question set is snapshotted when the sitting starts; `remaining` and the
/// answered map partition that snapshot until the sitting completes. Every
/// mutation bumps `revision`, which storage uses for compare-and-swap writes.
#[derive(Clone, PartialEq, Eq)]
pub struct Sitting {
    id: SittingId,
    learner_id: LearnerId,
    quiz_id: QuizId,
    course_id: CourseId,
    attempt_number: u32,
    question_order: Vec<QuestionId>,
    remaining: VecDeque<QuestionId>,
    answers: BTreeMap<QuestionId, RawAnswer>,
    incorrect: BTreeSet<QuestionId>,
    ungraded: BTreeSet<QuestionId>,
    correct_count: u32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    forced: bool,
    staff_preview: bool,
    revision: u32,
}

impl Sitting {
    /// Starts a new sitting over a snapshot of `question_ids`.
    ///
    /// `Fixed` keeps the given order; `Random` shuffles it with `rng`, so each
    /// sitting gets an independent permutation when the caller seeds `rng` per sitting.
    ///
    /// # Errors
    ///
    /// Returns `SittingError::Empty` if `question_ids` is empty.
    #[allow(clippy::too_many_arguments)]
    pub fn start<R: Rng + ?Sized>(
        learner_id: LearnerId,
        quiz_id: QuizId,
        course_id: CourseId,
        attempt_number: u32,
        mut question_ids: Vec<QuestionId>,
        ordering: OrderingMode,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Self, SittingError> {
        if question_ids.is_empty() {
            return Err(SittingError::Empty);
        }
        let mut seen = BTreeSet::new();
        question_ids.retain(|id| seen.insert(*id));
        if ordering == OrderingMode::Random {
            question_ids.shuffle(rng);
        }

        Ok(Self {
            id: SittingId::generate(),
            learner_id,
            quiz_id,
            course_id,
            attempt_number,
            remaining: question_ids.iter().copied().collect(),
            question_order: question_ids,
            answers: BTreeMap::new(),
            incorrect: BTreeSet::new(),
            ungraded: BTreeSet::new(),
            correct_count: 0,
            started_at: now,
            completed_at: None,
            forced: false,
            staff_preview: false,
            revision: 0,
        })
    }

    /// Renumbers a freshly started sitting. Admission assigns the final number
    /// once the attempt count has been read under its lock.
    #[must_use]
    pub fn with_attempt_number(mut self, attempt_number: u32) -> Self {
        self.attempt_number = attempt_number;
        self
    }

    /// Flags a freshly started sitting as admitted for staff; such sittings
    /// are kept after completion whatever the quiz policy says.
    #[must_use]
    pub fn with_staff_preview(mut self, staff_preview: bool) -> Self {
        self.staff_preview = staff_preview;
        self
    }

    /// Rehydrates a sitting from storage, checking the queue/answer partition.
    ///
    /// # Errors
    ///
    /// Returns `SittingError::InvalidPersistedState` when the persisted fields
    /// violate the sitting invariants.
    pub fn from_persisted(p: PersistedSitting) -> Result<Self, SittingError> {
        let invalid = |msg: &str| SittingError::InvalidPersistedState(msg.to_owned());

        if p.question_order.is_empty() {
            return Err(invalid("empty question snapshot"));
        }
        let snapshot: BTreeSet<_> = p.question_order.iter().copied().collect();
        if snapshot.len() != p.question_order.len() {
            return Err(invalid("duplicate question in snapshot"));
        }
        if p.remaining.iter().any(|id| p.answers.contains_key(id)) {
            return Err(invalid("answered question still queued"));
        }
        let covered = p.remaining.len() + p.answers.len();
        let all_known = p
            .remaining
            .iter()
            .chain(p.answers.keys())
            .all(|id| snapshot.contains(id));
        if !all_known {
            return Err(invalid("question outside the snapshot"));
        }
        if p.completed_at.is_none() && covered != snapshot.len() {
            return Err(invalid("queue and answers do not cover the snapshot"));
        }
        if p.incorrect.union(&p.ungraded).any(|id| !p.answers.contains_key(id)) {
            return Err(invalid("graded question without an answer"));
        }
        if p.completed_at.is_some_and(|done| done < p.started_at) {
            return Err(invalid("completed before started"));
        }

        Ok(Self {
            id: p.id,
            learner_id: p.learner_id,
            quiz_id: p.quiz_id,
            course_id: p.course_id,
            attempt_number: p.attempt_number,
            question_order: p.question_order,
            remaining: p.remaining.into_iter().collect(),
            answers: p.answers,
            incorrect: p.incorrect,
            ungraded: p.ungraded,
            correct_count: p.correct_count,
            started_at: p.started_at,
            completed_at: p.completed_at,
            forced: p.forced,
            staff_preview: p.staff_preview,
            revision: p.revision,
        })
    }

    /// Returns the persisted shape of this sitting.
    #[must_use]
    pub fn to_persisted(&self) -> PersistedSitting {
        PersistedSitting {
            id: self.id,
            learner_id: self.learner_id,
            quiz_id: self.quiz_id,
            course_id: self.course_id,
            attempt_number: self.attempt_number,
            question_order: self.question_order.clone(),
            remaining: self.remaining.iter().copied().collect(),
            answers: self.answers.clone(),
            incorrect: self.incorrect.clone(),
            ungraded: self.ungraded.clone(),
            correct_count: self.correct_count,
            started_at: self.started_at,
            completed_at: self.completed_at,
            forced: self.forced,
            staff_preview: self.staff_preview,
            revision: self.revision,
        }
    }

    #[must_use]
    pub fn id(&self) -> SittingId {
        self.id
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    #[must_use]
    pub fn question_order(&self) -> &[QuestionId] {
        &self.question_order
    }

    #[must_use]
    pub fn remaining_ids(&self) -> impl ExactSizeIterator<Item = QuestionId> + '_ {
        self.remaining.iter().copied()
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<QuestionId, RawAnswer> {
        &self.answers
    }

    #[must_use]
    pub fn answer_for(&self, id: QuestionId) -> Option<&RawAnswer> {
        self.answers.get(&id)
    }

    #[must_use]
    pub fn is_answered(&self, id: QuestionId) -> bool {
        self.answers.contains_key(&id)
    }

    #[must_use]
    pub fn incorrect(&self) -> &BTreeSet<QuestionId> {
        &self.incorrect
    }

    #[must_use]
    pub fn ungraded(&self) -> &BTreeSet<QuestionId> {
        &self.ungraded
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn was_forced(&self) -> bool {
        self.forced
    }

    #[must_use]
    pub fn is_staff_preview(&self) -> bool {
        self.staff_preview
    }

    /// Whether the sitting row outlives its result: exam papers and staff
    /// previews are kept, everything else is discarded.
    #[must_use]
    pub fn is_retained_under(&self, policy: &QuizPolicy) -> bool {
        policy.is_exam_paper() || self.staff_preview
    }

    #[must_use]
    pub fn revision(&self) -> u32 {
        self.revision
    }

    #[must_use]
    pub fn state(&self) -> SittingState {
        if self.completed_at.is_some() {
            SittingState::Complete
        } else {
            SittingState::InProgress
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.question_order.len()
    }

    #[must_use]
    pub fn progress(&self) -> SittingProgress {
        SittingProgress {
            total: self.total_questions(),
            answered: self.answers.len(),
            remaining: self.remaining.len(),
            is_complete: self.is_complete(),
        }
    }

    /// Head of the remaining queue. Does not mutate the sitting.
    #[must_use]
    pub fn current_question_id(&self) -> Option<QuestionId> {
        if self.is_complete() {
            return None;
        }
        self.remaining.front().copied()
    }

    /// `time_limit - (now - started_at)`, floored at zero. Recomputed on every call.
    #[must_use]
    pub fn time_remaining(&self, time_limit: Option<Duration>, now: DateTime<Utc>) -> TimeRemaining {
        match time_limit {
            None => TimeRemaining::Unbounded,
            Some(limit) => TimeRemaining::Limited(saturating_until(now, self.started_at + limit)),
        }
    }

    #[must_use]
    pub fn is_time_expired(&self, time_limit: Option<Duration>, now: DateTime<Utc>) -> bool {
        self.time_remaining(time_limit, now).is_exhausted()
    }

    /// Records an answer for the current question and pops it off the queue.
    ///
    /// Re-submitting an identical answer for an already answered question is
    /// treated as a replay: nothing is counted twice and the original outcome is
    /// reported again.
    ///
    /// # Errors
    ///
    /// - `SittingError::AlreadyComplete` if the sitting has been finalized.
    /// - `SittingError::TimeExpired` if the time limit has run out; the caller
    ///   must finalize instead.
    /// - `SittingError::OutOfOrderAnswer` if `question_id` is not the queue head.
    /// - `SittingError::UnknownQuestion` if the bank lacks the question.
    pub fn submit_answer(
        &mut self,
        policy: &QuizPolicy,
        bank: &QuestionBank,
        question_id: QuestionId,
        raw: RawAnswer,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, SittingError> {
        if self.is_complete() {
            return Err(SittingError::AlreadyComplete);
        }
        if self.is_time_expired(policy.time_limit(), now) {
            return Err(SittingError::TimeExpired);
        }

        if let Some(previous) = self.answers.get(&question_id) {
            if *previous == raw {
                let question = bank.require(question_id)?;
                return Ok(SubmitOutcome {
                    question_id,
                    replayed: true,
                    feedback: feedback_for(policy, question, question.is_correct(&raw)),
                    remaining: self.remaining.len(),
                });
            }
        }

        let expected = self.current_question_id();
        if expected != Some(question_id) {
            return Err(SittingError::OutOfOrderAnswer {
                expected,
                submitted: question_id,
            });
        }

        let question = bank.require(question_id)?;
        let correctness = question.is_correct(&raw);
        match correctness {
            Correctness::Correct => self.correct_count = self.correct_count.saturating_add(1),
            Correctness::Incorrect => {
                self.incorrect.insert(question_id);
            }
            Correctness::Ungraded => {
                self.ungraded.insert(question_id);
            }
        }
        self.answers.insert(question_id, raw);
        self.remaining.pop_front();
        self.revision = self.revision.wrapping_add(1);

        Ok(SubmitOutcome {
            question_id,
            replayed: false,
            feedback: feedback_for(policy, question, correctness),
            remaining: self.remaining.len(),
        })
    }

    /// Completes the sitting and computes its result.
    ///
    /// Allowed once the queue is empty, or earlier when the time limit has
    /// expired (the result is then flagged as forced and unanswered questions
    /// score zero).
    ///
    /// # Errors
    ///
    /// - `SittingError::AlreadyComplete` if called twice; callers that need
    ///   idempotence keep the first result.
    /// - `SittingError::QuestionsRemaining` if questions are left and time has not expired.
    /// - `SittingError::UnknownQuestion` if the bank lacks a snapshotted question.
    pub fn finalize(
        &mut self,
        policy: &QuizPolicy,
        bank: &QuestionBank,
        now: DateTime<Utc>,
        retained: bool,
    ) -> Result<SittingResult, SittingError> {
        if self.is_complete() {
            return Err(SittingError::AlreadyComplete);
        }
        let forced = !self.remaining.is_empty();
        if forced && !self.is_time_expired(policy.time_limit(), now) {
            return Err(SittingError::QuestionsRemaining(self.remaining.len()));
        }
        for id in &self.question_order {
            bank.require(*id)?;
        }

        self.completed_at = Some(now.max(self.started_at));
        self.forced = forced;
        self.revision = self.revision.wrapping_add(1);
        self.result(policy, bank, retained)
    }

    /// Staff correction of a completed sitting: marks an answered question as
    /// correct or incorrect. Essays leave the ungraded set once marked.
    ///
    /// Returns `true` if anything changed.
    ///
    /// # Errors
    ///
    /// - `SittingError::NotComplete` for a sitting still in progress.
    /// - `SittingError::NotAnswered` if the question has no recorded answer.
    pub fn mark(&mut self, question_id: QuestionId, correct: bool) -> Result<bool, SittingError> {
        if !self.is_complete() {
            return Err(SittingError::NotComplete);
        }
        if !self.answers.contains_key(&question_id) {
            return Err(SittingError::NotAnswered(question_id));
        }

        let was_ungraded = self.ungraded.remove(&question_id);
        let was_incorrect = self.incorrect.contains(&question_id);
        let was_correct = !was_ungraded && !was_incorrect;

        let changed = match (correct, was_correct) {
            (true, true) | (false, false) if !was_ungraded => false,
            (true, _) => {
                self.incorrect.remove(&question_id);
                self.correct_count = self.correct_count.saturating_add(1);
                true
            }
            (false, _) => {
                if was_correct {
                    self.correct_count = self.correct_count.saturating_sub(1);
                }
                self.incorrect.insert(question_id);
                true
            }
        };
        if changed {
            self.revision = self.revision.wrapping_add(1);
        }
        Ok(changed)
    }

    /// Computes the result of a completed sitting from its recorded state.
    ///
    /// Essays are excluded from the denominator; unanswered questions count as
    /// zero. The per-question breakdown is attached only for `RevealMode::AtEnd`.
    ///
    /// # Errors
    ///
    /// Returns `SittingError::NotComplete` for an in-progress sitting, or
    /// `SittingError::UnknownQuestion` if the bank lacks a snapshotted question.
    pub fn result(
        &self,
        policy: &QuizPolicy,
        bank: &QuestionBank,
        retained: bool,
    ) -> Result<SittingResult, SittingError> {
        let completed_at = self.completed_at.ok_or(SittingError::NotComplete)?;

        let mut graded_total = 0_u32;
        let mut ungraded = 0_u32;
        let mut breakdown = Vec::new();
        for id in &self.question_order {
            let question = bank.require(*id)?;
            let answer = self.answers.get(id).cloned();
            let correctness = answer.as_ref().map(|_| self.correctness_of(*id));

            match correctness {
                Some(Correctness::Ungraded) => ungraded += 1,
                None if question.is_essay() => ungraded += 1,
                _ => graded_total += 1,
            }

            if policy.reveal() == RevealMode::AtEnd {
                breakdown.push(QuestionReport {
                    question_id: *id,
                    prompt: question.prompt().to_owned(),
                    answer,
                    correctness,
                    correct_answer: question.correct_answer_text(),
                    explanation: question.explanation().to_owned(),
                });
            }
        }

        let score = score_percent(self.correct_count, graded_total);
        Ok(SittingResult {
            sitting_id: self.id,
            learner_id: self.learner_id,
            quiz_id: self.quiz_id,
            course_id: self.course_id,
            attempt_number: self.attempt_number,
            correct: self.correct_count,
            graded_total,
            ungraded,
            score_percent: score,
            passed: graded_total > 0 && score >= policy.pass_mark(),
            forced: self.forced,
            retained,
            started_at: self.started_at,
            completed_at,
            breakdown,
        })
    }

    /// Correctness recorded for an answered question.
    fn correctness_of(&self, id: QuestionId) -> Correctness {
        if self.ungraded.contains(&id) {
            Correctness::Ungraded
        } else if self.incorrect.contains(&id) {
            Correctness::Incorrect
        } else {
            Correctness::Correct
        }
    }

    /// Public form of the recorded correctness, `None` when unanswered.
    #[must_use]
    pub fn recorded_correctness(&self, id: QuestionId) -> Option<Correctness> {
        self.answers.get(&id).map(|_| self.correctness_of(id))
    }

    /// True when the remaining queue and the answered map partition the snapshot.
    #[must_use]
    pub fn queue_is_consistent(&self) -> bool {
        let disjoint = self.remaining.iter().all(|id| !self.answers.contains_key(id));
        disjoint && self.remaining.len() + self.answers.len() == self.question_order.len()
    }
}

fn feedback_for(policy: &QuizPolicy, question: &Question, correctness: Correctness) -> Option<Feedback> {
    match policy.reveal() {
        RevealMode::AtEnd => None,
        RevealMode::Immediate => Some(Feedback {
            correctness,
            correct_answer: question.correct_answer_text(),
            explanation: question.explanation().to_owned(),
        }),
    }
}

impl fmt::Debug for Sitting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sitting")
            .field("id", &self.id)
            .field("learner_id", &self.learner_id)
            .field("quiz_id", &self.quiz_id)
            .field("attempt_number", &self.attempt_number)
            .field("remaining_len", &self.remaining.len())
            .field("answered_len", &self.answers.len())
            .field("correct_count", &self.correct_count)
            .field("completed_at", &self.completed_at)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
