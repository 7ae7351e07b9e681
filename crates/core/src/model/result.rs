use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, LearnerId, QuestionId, QuizId, SittingId};
use crate::model::question::{Correctness, RawAnswer};

/// Percentage score rounded to the nearest integer; `0` when nothing is gradable.
#[must_use]
pub fn score_percent(correct: u32, graded_total: u32) -> u8 {
    if graded_total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(graded_total));
    let total = u64::from(graded_total);
    let rounded = (correct * 200 + total) / (total * 2);
    u8::try_from(rounded).unwrap_or(100)
}

/// One row of the per-question breakdown.
///
/// `correctness` is `None` for a question left unanswered when time ran out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionReport {
    pub question_id: QuestionId,
    pub prompt: String,
    pub answer: Option<RawAnswer>,
    pub correctness: Option<Correctness>,
    pub correct_answer: Option<String>,
    pub explanation: String,
}

/// Outcome of a finalized sitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SittingResult {
    pub sitting_id: SittingId,
    pub learner_id: LearnerId,
    pub quiz_id: QuizId,
    pub course_id: CourseId,
    pub attempt_number: u32,
    pub correct: u32,
    pub graded_total: u32,
    pub ungraded: u32,
    pub score_percent: u8,
    pub passed: bool,
    pub forced: bool,
    pub retained: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breakdown: Vec<QuestionReport>,
}

impl SittingResult {
    /// Orders two results for "best attempt" selection: higher score wins,
    /// ties go to the earlier completion.
    #[must_use]
    pub fn is_better_than(&self, other: &SittingResult) -> bool {
        self.score_percent > other.score_percent
            || (self.score_percent == other.score_percent && self.completed_at < other.completed_at)
    }

    /// Picks the best result out of `results`.
    #[must_use]
    pub fn best<'a, I>(results: I) -> Option<&'a SittingResult>
    where
        I: IntoIterator<Item = &'a SittingResult>,
    {
        results.into_iter().fold(None, |best, candidate| match best {
            Some(current) if !candidate.is_better_than(current) => Some(current),
            _ => Some(candidate),
        })
    }

    /// Copy without the per-question breakdown, for listings.
    #[must_use]
    pub fn summary(&self) -> SittingResult {
        SittingResult {
            breakdown: Vec::new(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn result(score: u8, minutes: i64) -> SittingResult {
        SittingResult {
            sitting_id: SittingId::generate(),
            learner_id: LearnerId::new(1),
            quiz_id: QuizId::new(1),
            course_id: CourseId::new(1),
            attempt_number: 1,
            correct: 0,
            graded_total: 0,
            ungraded: 0,
            score_percent: score,
            passed: false,
            forced: false,
            retained: true,
            started_at: fixed_now(),
            completed_at: fixed_now() + Duration::minutes(minutes),
            breakdown: Vec::new(),
        }
    }

    #[test]
    fn score_rounds_half_up_and_handles_zero_denominator() {
        assert_eq!(score_percent(0, 0), 0);
        assert_eq!(score_percent(1, 1), 100);
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 8), 13);
        assert_eq!(score_percent(5, 3), 100);
    }

    #[test]
    fn best_prefers_higher_score_then_earlier_completion() {
        let results = vec![result(40, 1), result(80, 5), result(80, 2), result(10, 0)];
        let best = SittingResult::best(&results).unwrap();
        assert_eq!(best.score_percent, 80);
        assert_eq!(best.completed_at, fixed_now() + Duration::minutes(2));
        assert!(SittingResult::best(&Vec::new()).is_none());
    }

    #[test]
    fn serializes_without_empty_breakdown() {
        let json = serde_json::to_value(result(50, 1)).unwrap();
        assert!(json.get("breakdown").is_none());
        let back: SittingResult = serde_json::from_value(json).unwrap();
        assert!(back.breakdown.is_empty());
    }
}
