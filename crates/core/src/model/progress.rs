use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::ids::{CategoryId, LearnerId};
use crate::model::question::Correctness;
use crate::model::sitting::{QuestionBank, Sitting};
use crate::model::result::score_percent;

/// Cumulative correct/total for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryScore {
    pub correct: u32,
    pub total: u32,
}

impl CategoryScore {
    #[must_use]
    pub fn percent(self) -> u8 {
        score_percent(self.correct, self.total)
    }
}

/// Per-category contribution of a single finalized sitting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressDelta {
    entries: BTreeMap<CategoryId, CategoryScore>,
}

impl ProgressDelta {
    /// Collects category counts from a completed sitting.
    ///
    /// Essays and uncategorised questions contribute nothing. Unanswered
    /// questions count towards the total with no credit, matching the score.
    #[must_use]
    pub fn from_sitting(sitting: &Sitting, bank: &QuestionBank) -> Self {
        let mut entries: BTreeMap<CategoryId, CategoryScore> = BTreeMap::new();
        for id in sitting.question_order() {
            let Some(question) = bank.get(*id) else {
                continue;
            };
            let Some(category) = question.category() else {
                continue;
            };
            if question.is_essay() {
                continue;
            }
            let correct = match sitting.recorded_correctness(*id) {
                Some(Correctness::Ungraded) => continue,
                Some(Correctness::Correct) => 1,
                Some(Correctness::Incorrect) | None => 0,
            };
            let entry = entries.entry(category).or_default();
            entry.correct += correct;
            entry.total += 1;
        }
        Self { entries }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, CategoryScore)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }
}

/// A learner's running per-category score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    learner_id: LearnerId,
    categories: BTreeMap<CategoryId, CategoryScore>,
}

impl Progress {
    #[must_use]
    pub fn new(learner_id: LearnerId) -> Self {
        Self {
            learner_id,
            categories: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn from_persisted(learner_id: LearnerId, categories: BTreeMap<CategoryId, CategoryScore>) -> Self {
        Self {
            learner_id,
            categories,
        }
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn category(&self, id: CategoryId) -> CategoryScore {
        self.categories.get(&id).copied().unwrap_or_default()
    }

    pub fn categories(&self) -> impl Iterator<Item = (CategoryId, CategoryScore)> + '_ {
        self.categories.iter().map(|(k, v)| (*k, *v))
    }

    pub fn apply(&mut self, delta: &ProgressDelta) {
        for (category, score) in delta.iter() {
            let entry = self.categories.entry(category).or_default();
            entry.correct = entry.correct.saturating_add(score.correct);
            entry.total = entry.total.saturating_add(score.total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{CourseId, QuestionId, QuizId};
    use crate::model::policy::{OrderingMode, QuizPolicy};
    use crate::model::question::{Question, QuestionKind, RawAnswer};
    use crate::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn tf(id: u64, answer: bool, category: Option<u64>) -> Question {
        let q = Question::new(
            QuestionId::new(id),
            QuizId::new(1),
            format!("Q{id}"),
            "",
            QuestionKind::TrueFalse { answer },
        )
        .unwrap();
        match category {
            Some(c) => q.with_category(CategoryId::new(c)),
            None => q,
        }
    }

    #[test]
    fn delta_skips_essays_and_uncategorised_questions() {
        let essay = Question::new(QuestionId::new(4), QuizId::new(1), "E", "", QuestionKind::Essay)
            .unwrap()
            .with_category(CategoryId::new(1));
        let bank = QuestionBank::new(vec![
            tf(1, true, Some(1)),
            tf(2, true, Some(1)),
            tf(3, true, None),
            essay,
        ]);
        let policy = QuizPolicy::builder(QuizId::new(1), CourseId::new(1), "P")
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut sitting = Sitting::start(
            LearnerId::new(9),
            QuizId::new(1),
            CourseId::new(1),
            1,
            bank.ids().to_vec(),
            OrderingMode::Fixed,
            &mut rng,
            fixed_now(),
        )
        .unwrap();
        for (id, raw) in [
            (1, RawAnswer::Boolean(true)),
            (2, RawAnswer::Boolean(false)),
            (3, RawAnswer::Boolean(true)),
            (4, RawAnswer::Text("prose".into())),
        ] {
            sitting
                .submit_answer(&policy, &bank, QuestionId::new(id), raw, fixed_now())
                .unwrap();
        }
        sitting.finalize(&policy, &bank, fixed_now(), false).unwrap();

        let delta = ProgressDelta::from_sitting(&sitting, &bank);
        let entries: Vec<_> = delta.iter().collect();
        assert_eq!(entries, vec![(CategoryId::new(1), CategoryScore { correct: 1, total: 2 })]);

        let mut progress = Progress::new(LearnerId::new(9));
        progress.apply(&delta);
        progress.apply(&delta);
        assert_eq!(progress.category(CategoryId::new(1)), CategoryScore { correct: 2, total: 4 });
        assert_eq!(progress.category(CategoryId::new(1)).percent(), 50);
        assert_eq!(progress.category(CategoryId::new(2)), CategoryScore::default());
    }
}
