use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, QuizId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PolicyError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("attempt ceiling must be >= 1")]
    InvalidAttemptCeiling,

    #[error("pass mark must be between 0 and 100, got {0}")]
    InvalidPassMark(u8),

    #[error("available_from is after available_until")]
    InvalidWindow,

    #[error("time limit must be positive")]
    InvalidTimeLimit,
}

//
// ─── MODES ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMode {
    /// Authoring order.
    #[default]
    Fixed,
    /// A fresh uniform permutation per sitting.
    Random,
}

impl OrderingMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OrderingMode::Fixed => "fixed",
            OrderingMode::Random => "random",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealMode {
    /// Correctness is withheld until the sitting is finalized.
    #[default]
    AtEnd,
    /// Correctness and explanation are returned with every answer.
    Immediate,
}

impl RevealMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RevealMode::AtEnd => "at_end",
            RevealMode::Immediate => "immediate",
        }
    }
}

//
// ─── POLICY ────────────────────────────────────────────────────────────────────
//

/// Authored configuration of a quiz. Immutable for the lifetime of a sitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct QuizPolicy {
    id: QuizId,
    course_id: CourseId,
    title: String,
    ordering: OrderingMode,
    reveal: RevealMode,
    pass_mark: u8,
    attempt_ceiling: u32,
    draft: bool,
    exam_paper: bool,
    available_from: Option<DateTime<Utc>>,
    available_until: Option<DateTime<Utc>>,
    #[serde(with = "optional_seconds")]
    time_limit: Option<Duration>,
    review_after_submission: bool,
    answers_visible_after: Option<DateTime<Utc>>,
}

impl QuizPolicy {
    /// Starts a policy with permissive defaults: fixed order, answers at end,
    /// pass mark 50, a single attempt, published, always open, untimed.
    #[must_use]
    pub fn builder(id: QuizId, course_id: CourseId, title: impl Into<String>) -> QuizPolicyBuilder {
        QuizPolicyBuilder {
            policy: QuizPolicy {
                id,
                course_id,
                title: title.into(),
                ordering: OrderingMode::Fixed,
                reveal: RevealMode::AtEnd,
                pass_mark: 50,
                attempt_ceiling: 1,
                draft: false,
                exam_paper: false,
                available_from: None,
                available_until: None,
                time_limit: None,
                review_after_submission: false,
                answers_visible_after: None,
            },
        }
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn ordering(&self) -> OrderingMode {
        self.ordering
    }

    #[must_use]
    pub fn reveal(&self) -> RevealMode {
        self.reveal
    }

    #[must_use]
    pub fn pass_mark(&self) -> u8 {
        self.pass_mark
    }

    #[must_use]
    pub fn attempt_ceiling(&self) -> u32 {
        self.attempt_ceiling
    }

    #[must_use]
    pub fn single_attempt(&self) -> bool {
        self.attempt_ceiling == 1
    }

    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.draft
    }

    #[must_use]
    pub fn is_exam_paper(&self) -> bool {
        self.exam_paper
    }

    #[must_use]
    pub fn available_from(&self) -> Option<DateTime<Utc>> {
        self.available_from
    }

    #[must_use]
    pub fn available_until(&self) -> Option<DateTime<Utc>> {
        self.available_until
    }

    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit
    }

    #[must_use]
    pub fn review_after_submission(&self) -> bool {
        self.review_after_submission
    }

    #[must_use]
    pub fn answers_visible_after(&self) -> Option<DateTime<Utc>> {
        self.answers_visible_after
    }
}

#[derive(Debug, Clone)]
#[must_use]
pub struct QuizPolicyBuilder {
    policy: QuizPolicy,
}

impl QuizPolicyBuilder {
    pub fn ordering(mut self, ordering: OrderingMode) -> Self {
        self.policy.ordering = ordering;
        self
    }

    pub fn reveal(mut self, reveal: RevealMode) -> Self {
        self.policy.reveal = reveal;
        self
    }

    pub fn pass_mark(mut self, pass_mark: u8) -> Self {
        self.policy.pass_mark = pass_mark;
        self
    }

    pub fn attempt_ceiling(mut self, ceiling: u32) -> Self {
        self.policy.attempt_ceiling = ceiling;
        self
    }

    pub fn draft(mut self, draft: bool) -> Self {
        self.policy.draft = draft;
        self
    }

    pub fn exam_paper(mut self, exam_paper: bool) -> Self {
        self.policy.exam_paper = exam_paper;
        self
    }

    pub fn available_from(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.policy.available_from = at;
        self
    }

    pub fn available_until(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.policy.available_until = at;
        self
    }

    pub fn time_limit(mut self, limit: Option<Duration>) -> Self {
        self.policy.time_limit = limit;
        self
    }

    pub fn review_after_submission(mut self, allowed: bool) -> Self {
        self.policy.review_after_submission = allowed;
        self
    }

    pub fn answers_visible_after(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.policy.answers_visible_after = at;
        self
    }

    /// Validates and returns the policy.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError` for an empty title, a zero attempt ceiling, a pass
    /// mark above 100, an inverted availability window, or a non-positive time limit.
    pub fn build(self) -> Result<QuizPolicy, PolicyError> {
        let policy = self.policy;
        if policy.title.trim().is_empty() {
            return Err(PolicyError::EmptyTitle);
        }
        if policy.attempt_ceiling == 0 {
            return Err(PolicyError::InvalidAttemptCeiling);
        }
        if policy.pass_mark > 100 {
            return Err(PolicyError::InvalidPassMark(policy.pass_mark));
        }
        if let (Some(from), Some(until)) = (policy.available_from, policy.available_until) {
            if from > until {
                return Err(PolicyError::InvalidWindow);
            }
        }
        if let Some(limit) = policy.time_limit {
            if limit <= Duration::zero() {
                return Err(PolicyError::InvalidTimeLimit);
            }
        }
        Ok(policy)
    }
}

/// Stores an optional `Duration` as whole seconds.
mod optional_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.num_seconds()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<i64>::deserialize(d)?.map(Duration::seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn base() -> QuizPolicyBuilder {
        QuizPolicy::builder(QuizId::new(1), CourseId::new(1), "Week 1")
    }

    #[test]
    fn defaults_are_single_attempt_and_untimed() {
        let policy = base().build().unwrap();
        assert!(policy.single_attempt());
        assert_eq!(policy.time_limit(), None);
        assert_eq!(policy.reveal(), RevealMode::AtEnd);
        assert_eq!(policy.ordering(), OrderingMode::Fixed);
    }

    #[test]
    fn build_rejects_invalid_values() {
        assert_eq!(
            base().attempt_ceiling(0).build().unwrap_err(),
            PolicyError::InvalidAttemptCeiling
        );
        assert_eq!(
            base().pass_mark(101).build().unwrap_err(),
            PolicyError::InvalidPassMark(101)
        );
        assert_eq!(
            base()
                .available_from(Some(fixed_now()))
                .available_until(Some(fixed_now() - Duration::hours(1)))
                .build()
                .unwrap_err(),
            PolicyError::InvalidWindow
        );
        assert_eq!(
            base()
                .time_limit(Some(Duration::zero()))
                .build()
                .unwrap_err(),
            PolicyError::InvalidTimeLimit
        );
    }

    #[test]
    fn policy_round_trips_through_json() {
        let policy = base()
            .time_limit(Some(Duration::minutes(15)))
            .reveal(RevealMode::Immediate)
            .build()
            .unwrap();
        let json = serde_json::to_string(&policy).unwrap();
        let back: QuizPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);
    }
}
