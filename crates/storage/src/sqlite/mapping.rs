use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use quiz_core::model::{
    CategoryId, CourseId, LearnerId, OrderingMode, PersistedSitting, Question, QuestionId,
    QuestionKind, QuizId, QuizPolicy, RawAnswer, RevealMode, Sitting, SittingId, SittingResult,
};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

fn from_json<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T, StorageError> {
    let raw: String = row.try_get(column).map_err(ser)?;
    serde_json::from_str(&raw).map_err(ser)
}

pub(crate) fn quiz_id_from_i64(v: i64) -> Result<QuizId, StorageError> {
    Ok(QuizId::new(i64_to_u64("quiz_id", v)?))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn learner_id_from_i64(v: i64) -> Result<LearnerId, StorageError> {
    Ok(LearnerId::new(i64_to_u64("learner_id", v)?))
}

pub(crate) fn category_id_from_i64(v: i64) -> Result<CategoryId, StorageError> {
    Ok(CategoryId::new(i64_to_u64("category_id", v)?))
}

pub(crate) fn parse_ordering(s: &str) -> Result<OrderingMode, StorageError> {
    match s {
        "fixed" => Ok(OrderingMode::Fixed),
        "random" => Ok(OrderingMode::Random),
        _ => Err(StorageError::Serialization(format!("invalid ordering: {s}"))),
    }
}

pub(crate) fn parse_reveal(s: &str) -> Result<RevealMode, StorageError> {
    match s {
        "at_end" => Ok(RevealMode::AtEnd),
        "immediate" => Ok(RevealMode::Immediate),
        _ => Err(StorageError::Serialization(format!("invalid reveal mode: {s}"))),
    }
}

pub(crate) fn map_policy_row(row: &SqliteRow) -> Result<QuizPolicy, StorageError> {
    let pass_mark = u8::try_from(row.try_get::<i64, _>("pass_mark").map_err(ser)?).map_err(ser)?;
    let ceiling = u32_from_i64(
        "attempt_ceiling",
        row.try_get::<i64, _>("attempt_ceiling").map_err(ser)?,
    )?;
    let ordering = parse_ordering(row.try_get::<String, _>("ordering").map_err(ser)?.as_str())?;
    let reveal = parse_reveal(row.try_get::<String, _>("reveal").map_err(ser)?.as_str())?;
    let time_limit = row
        .try_get::<Option<i64>, _>("time_limit_secs")
        .map_err(ser)?
        .map(Duration::seconds);

    QuizPolicy::builder(
        quiz_id_from_i64(row.try_get("id").map_err(ser)?)?,
        course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
    )
    .ordering(ordering)
    .reveal(reveal)
    .pass_mark(pass_mark)
    .attempt_ceiling(ceiling)
    .draft(row.try_get("draft").map_err(ser)?)
    .exam_paper(row.try_get("exam_paper").map_err(ser)?)
    .available_from(row.try_get("available_from").map_err(ser)?)
    .available_until(row.try_get("available_until").map_err(ser)?)
    .time_limit(time_limit)
    .review_after_submission(row.try_get("review_after_submission").map_err(ser)?)
    .answers_visible_after(row.try_get("answers_visible_after").map_err(ser)?)
    .build()
    .map_err(ser)
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let kind: QuestionKind = from_json(row, "kind")?;
    let question = Question::new(
        QuestionId::new(i64_to_u64("question_id", row.try_get("id").map_err(ser)?)?),
        quiz_id_from_i64(row.try_get("quiz_id").map_err(ser)?)?,
        row.try_get::<String, _>("prompt").map_err(ser)?,
        row.try_get::<String, _>("explanation").map_err(ser)?,
        kind,
    )
    .map_err(ser)?;

    match row.try_get::<Option<i64>, _>("category_id").map_err(ser)? {
        Some(category) => Ok(question.with_category(category_id_from_i64(category)?)),
        None => Ok(question),
    }
}

/// JSON-encoded sitting columns, in bind order.
pub(crate) struct SittingColumns {
    pub question_order: String,
    pub remaining: String,
    pub answers: String,
    pub incorrect: String,
    pub ungraded: String,
}

impl SittingColumns {
    pub(crate) fn encode(sitting: &Sitting) -> Result<Self, StorageError> {
        let remaining: Vec<QuestionId> = sitting.remaining_ids().collect();
        let answers: Vec<(&QuestionId, &RawAnswer)> = sitting.answers().iter().collect();
        Ok(Self {
            question_order: to_json(&sitting.question_order())?,
            remaining: to_json(&remaining)?,
            answers: to_json(&answers)?,
            incorrect: to_json(sitting.incorrect())?,
            ungraded: to_json(sitting.ungraded())?,
        })
    }
}

pub(crate) fn map_sitting_row(row: &SqliteRow) -> Result<Sitting, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let answers: Vec<(QuestionId, RawAnswer)> = from_json(row, "answers")?;
    let persisted = PersistedSitting {
        id: id.parse::<SittingId>().map_err(ser)?,
        learner_id: learner_id_from_i64(row.try_get("learner_id").map_err(ser)?)?,
        quiz_id: quiz_id_from_i64(row.try_get("quiz_id").map_err(ser)?)?,
        course_id: course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        attempt_number: u32_from_i64(
            "attempt_number",
            row.try_get::<i64, _>("attempt_number").map_err(ser)?,
        )?,
        question_order: from_json(row, "question_order")?,
        remaining: from_json(row, "remaining")?,
        answers: answers.into_iter().collect::<BTreeMap<_, _>>(),
        incorrect: from_json::<BTreeSet<QuestionId>>(row, "incorrect")?,
        ungraded: from_json::<BTreeSet<QuestionId>>(row, "ungraded")?,
        correct_count: u32_from_i64(
            "correct_count",
            row.try_get::<i64, _>("correct_count").map_err(ser)?,
        )?,
        started_at: row.try_get("started_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        forced: row.try_get("forced").map_err(ser)?,
        staff_preview: row.try_get("staff_preview").map_err(ser)?,
        revision: u32_from_i64("revision", row.try_get::<i64, _>("revision").map_err(ser)?)?,
    };
    Sitting::from_persisted(persisted).map_err(ser)
}

pub(crate) fn map_record_row(row: &SqliteRow) -> Result<SittingResult, StorageError> {
    from_json(row, "payload")
}
