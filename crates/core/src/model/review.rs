use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::policy::QuizPolicy;
use crate::model::result::{QuestionReport, SittingResult};
use crate::model::sitting::{QuestionBank, Sitting, SittingError};

/// Whether a learner may see correct answers for a quiz right now.
///
/// Either condition is enough: review-after-submission once the learner has a
/// completed sitting, or the configured visibility time having passed.
#[must_use]
pub fn answers_visible(policy: &QuizPolicy, now: DateTime<Utc>, has_completed: bool) -> bool {
    let after_submission = policy.review_after_submission() && has_completed;
    let after_time = policy.answers_visible_after().is_some_and(|at| now >= at);
    after_submission || after_time
}

/// Full review of a completed sitting, every question with its correct answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSheet {
    pub quiz_title: String,
    pub result: SittingResult,
    pub items: Vec<QuestionReport>,
}

impl ReviewSheet {
    /// # Errors
    ///
    /// Returns `SittingError::NotComplete` for a sitting still in progress and
    /// `SittingError::UnknownQuestion` when the bank lacks a snapshotted question.
    pub fn build(
        policy: &QuizPolicy,
        bank: &QuestionBank,
        sitting: &Sitting,
        retained: bool,
    ) -> Result<Self, SittingError> {
        let result = sitting.result(policy, bank, retained)?.summary();
        let mut items = Vec::with_capacity(sitting.total_questions());
        for id in sitting.question_order() {
            let question = bank.get(*id).ok_or(SittingError::UnknownQuestion(*id))?;
            items.push(QuestionReport {
                question_id: *id,
                prompt: question.prompt().to_owned(),
                answer: sitting.answer_for(*id).cloned(),
                correctness: sitting.recorded_correctness(*id),
                correct_answer: question.correct_answer_text(),
                explanation: question.explanation().to_owned(),
            });
        }
        Ok(Self {
            quiz_title: policy.title().to_owned(),
            result,
            items,
        })
    }
}
