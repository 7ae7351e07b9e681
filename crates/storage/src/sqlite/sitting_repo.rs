use quiz_core::model::{CourseId, LearnerId, QuizId, Sitting, SittingId, SittingResult};
use sqlx::{Row, SqliteConnection};

use super::mapping::{SittingColumns, id_i64, map_record_row, map_sitting_row, ser, to_json};
use super::{SqliteRepository, begin_immediate, conn_err};
use crate::repository::{Admission, Completion, CompletionOutcome, SittingRepository, StorageError};

const SITTING_COLUMNS: &str = r"
    id, learner_id, quiz_id, course_id, attempt_number, question_order, remaining,
    answers, incorrect, ungraded, correct_count, started_at, completed_at, forced, revision,
    staff_preview
";

async fn active_in(
    conn: &mut SqliteConnection,
    learner_id: LearnerId,
    quiz_id: QuizId,
    course_id: CourseId,
) -> Result<Option<Sitting>, StorageError> {
    let rows = sqlx::query(&format!(
        r"
        SELECT {SITTING_COLUMNS}
        FROM sittings
        WHERE learner_id = ?1 AND quiz_id = ?2 AND course_id = ?3 AND completed_at IS NULL
        "
    ))
    .bind(id_i64("learner_id", learner_id.value())?)
    .bind(id_i64("quiz_id", quiz_id.value())?)
    .bind(id_i64("course_id", course_id.value())?)
    .fetch_all(&mut *conn)
    .await
    .map_err(conn_err)?;

    match rows.as_slice() {
        [] => Ok(None),
        [row] => map_sitting_row(row).map(Some),
        many => Err(StorageError::DuplicateActive {
            learner_id,
            quiz_id,
            count: many.len(),
        }),
    }
}

async fn attempts_used(
    conn: &mut SqliteConnection,
    learner_id: LearnerId,
    quiz_id: QuizId,
    course_id: CourseId,
) -> Result<u32, StorageError> {
    let row = sqlx::query(
        r"
        SELECT COUNT(*) AS used
        FROM attempt_records
        WHERE learner_id = ?1 AND quiz_id = ?2 AND course_id = ?3
        ",
    )
    .bind(id_i64("learner_id", learner_id.value())?)
    .bind(id_i64("quiz_id", quiz_id.value())?)
    .bind(id_i64("course_id", course_id.value())?)
    .fetch_one(&mut *conn)
    .await
    .map_err(conn_err)?;
    let used: i64 = row.try_get("used").map_err(ser)?;
    u32::try_from(used).map_err(ser)
}

async fn insert_sitting(conn: &mut SqliteConnection, sitting: &Sitting) -> Result<(), StorageError> {
    let cols = SittingColumns::encode(sitting)?;
    sqlx::query(&format!(
        r"
        INSERT INTO sittings ({SITTING_COLUMNS})
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "
    ))
    .bind(sitting.id().to_string())
    .bind(id_i64("learner_id", sitting.learner_id().value())?)
    .bind(id_i64("quiz_id", sitting.quiz_id().value())?)
    .bind(id_i64("course_id", sitting.course_id().value())?)
    .bind(i64::from(sitting.attempt_number()))
    .bind(cols.question_order)
    .bind(cols.remaining)
    .bind(cols.answers)
    .bind(cols.incorrect)
    .bind(cols.ungraded)
    .bind(i64::from(sitting.correct_count()))
    .bind(sitting.started_at())
    .bind(sitting.completed_at())
    .bind(sitting.was_forced())
    .bind(i64::from(sitting.revision()))
    .bind(sitting.is_staff_preview())
    .execute(&mut *conn)
    .await
    .map_err(conn_err)?;
    Ok(())
}

/// Overwrites the mutable columns if the stored revision still matches.
/// `only_active` additionally requires the stored row to be in progress.
async fn update_sitting(
    conn: &mut SqliteConnection,
    sitting: &Sitting,
    expected_revision: u32,
    only_active: bool,
) -> Result<(), StorageError> {
    let cols = SittingColumns::encode(sitting)?;
    let guard = if only_active { "AND completed_at IS NULL" } else { "" };
    let res = sqlx::query(&format!(
        r"
        UPDATE sittings SET
            remaining = ?1,
            answers = ?2,
            incorrect = ?3,
            ungraded = ?4,
            correct_count = ?5,
            completed_at = ?6,
            forced = ?7,
            revision = ?8
        WHERE id = ?9 AND revision = ?10 {guard}
        "
    ))
    .bind(cols.remaining)
    .bind(cols.answers)
    .bind(cols.incorrect)
    .bind(cols.ungraded)
    .bind(i64::from(sitting.correct_count()))
    .bind(sitting.completed_at())
    .bind(sitting.was_forced())
    .bind(i64::from(sitting.revision()))
    .bind(sitting.id().to_string())
    .bind(i64::from(expected_revision))
    .execute(&mut *conn)
    .await
    .map_err(conn_err)?;

    if res.rows_affected() == 0 {
        return Err(StorageError::Conflict);
    }
    Ok(())
}

async fn record_in(
    conn: &mut SqliteConnection,
    sitting_id: SittingId,
) -> Result<Option<SittingResult>, StorageError> {
    let row = sqlx::query("SELECT payload FROM attempt_records WHERE sitting_id = ?1")
        .bind(sitting_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(conn_err)?;
    row.as_ref().map(map_record_row).transpose()
}

async fn admit_in(
    conn: &mut SqliteConnection,
    candidate: Sitting,
    attempt_ceiling: u32,
) -> Result<Admission, StorageError> {
    let (learner_id, quiz_id, course_id) =
        (candidate.learner_id(), candidate.quiz_id(), candidate.course_id());
    let used = attempts_used(conn, learner_id, quiz_id, course_id).await?;
    if used >= attempt_ceiling {
        return Ok(Admission::Exhausted { used });
    }
    if let Some(active) = active_in(conn, learner_id, quiz_id, course_id).await? {
        return Ok(Admission::Resumed(active));
    }
    let sitting = candidate.with_attempt_number(used + 1);
    insert_sitting(conn, &sitting).await?;
    Ok(Admission::Created(sitting))
}

async fn complete_in(
    conn: &mut SqliteConnection,
    completion: Completion<'_>,
) -> Result<CompletionOutcome, StorageError> {
    let sitting = completion.sitting;
    if let Some(existing) = record_in(conn, sitting.id()).await? {
        return Ok(CompletionOutcome::AlreadyRecorded(existing));
    }

    if completion.discard_sitting {
        let res = sqlx::query(
            "DELETE FROM sittings WHERE id = ?1 AND revision = ?2 AND completed_at IS NULL",
        )
        .bind(sitting.id().to_string())
        .bind(i64::from(completion.expected_revision))
        .execute(&mut *conn)
        .await
        .map_err(conn_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
    } else {
        update_sitting(conn, sitting, completion.expected_revision, true).await?;
    }

    let result = completion.result;
    sqlx::query(
        r"
        INSERT INTO attempt_records (
            sitting_id, learner_id, quiz_id, course_id, attempt_number,
            score_percent, passed, completed_at, payload
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ",
    )
    .bind(result.sitting_id.to_string())
    .bind(id_i64("learner_id", result.learner_id.value())?)
    .bind(id_i64("quiz_id", result.quiz_id.value())?)
    .bind(id_i64("course_id", result.course_id.value())?)
    .bind(i64::from(result.attempt_number))
    .bind(i64::from(result.score_percent))
    .bind(result.passed)
    .bind(result.completed_at)
    .bind(to_json(result)?)
    .execute(&mut *conn)
    .await
    .map_err(conn_err)?;

    let learner_id = id_i64("learner_id", sitting.learner_id().value())?;
    for (category, score) in completion.progress.iter() {
        sqlx::query(
            r"
            INSERT INTO progress (learner_id, category_id, correct, total)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(learner_id, category_id) DO UPDATE SET
                correct = correct + excluded.correct,
                total = total + excluded.total
            ",
        )
        .bind(learner_id)
        .bind(id_i64("category_id", category.value())?)
        .bind(i64::from(score.correct))
        .bind(i64::from(score.total))
        .execute(&mut *conn)
        .await
        .map_err(conn_err)?;
    }

    Ok(CompletionOutcome::Recorded(result.clone()))
}

async fn mark_in(
    conn: &mut SqliteConnection,
    sitting: &Sitting,
    expected_revision: u32,
    result: &SittingResult,
) -> Result<(), StorageError> {
    update_sitting(conn, sitting, expected_revision, false).await?;
    let res = sqlx::query(
        r"
        UPDATE attempt_records SET score_percent = ?1, passed = ?2, payload = ?3
        WHERE sitting_id = ?4
        ",
    )
    .bind(i64::from(result.score_percent))
    .bind(result.passed)
    .bind(to_json(result)?)
    .bind(sitting.id().to_string())
    .execute(&mut *conn)
    .await
    .map_err(conn_err)?;
    if res.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

#[async_trait::async_trait]
impl SittingRepository for SqliteRepository {
    async fn admit(&self, candidate: Sitting, attempt_ceiling: u32) -> Result<Admission, StorageError> {
        let mut tx = begin_immediate(&self.pool).await?;
        let outcome = admit_in(&mut *tx, candidate, attempt_ceiling).await?;
        tx.commit().await.map_err(conn_err)?;
        Ok(outcome)
    }

    async fn find_active(
        &self,
        learner_id: LearnerId,
        quiz_id: QuizId,
        course_id: CourseId,
    ) -> Result<Option<Sitting>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(conn_err)?;
        active_in(&mut conn, learner_id, quiz_id, course_id).await
    }

    async fn get_sitting(&self, id: SittingId) -> Result<Sitting, StorageError> {
        let row = sqlx::query(&format!("SELECT {SITTING_COLUMNS} FROM sittings WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn_err)?
            .ok_or(StorageError::NotFound)?;
        map_sitting_row(&row)
    }

    async fn save_progress(&self, sitting: &Sitting, expected_revision: u32) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(conn_err)?;
        update_sitting(&mut conn, sitting, expected_revision, true).await
    }

    async fn commit_completion(&self, completion: Completion<'_>) -> Result<CompletionOutcome, StorageError> {
        let mut tx = begin_immediate(&self.pool).await?;
        let outcome = complete_in(&mut *tx, completion).await?;
        tx.commit().await.map_err(conn_err)?;
        Ok(outcome)
    }

    async fn save_marking(
        &self,
        sitting: &Sitting,
        expected_revision: u32,
        result: &SittingResult,
    ) -> Result<(), StorageError> {
        let mut tx = begin_immediate(&self.pool).await?;
        let outcome = mark_in(&mut *tx, sitting, expected_revision, result).await?;
        tx.commit().await.map_err(conn_err)?;
        Ok(outcome)
    }

    async fn list_active(&self) -> Result<Vec<Sitting>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {SITTING_COLUMNS} FROM sittings WHERE completed_at IS NULL ORDER BY started_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;
        rows.iter().map(map_sitting_row).collect()
    }

    async fn list_completed(&self, quiz_id: QuizId) -> Result<Vec<Sitting>, StorageError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {SITTING_COLUMNS}
            FROM sittings
            WHERE quiz_id = ?1 AND completed_at IS NOT NULL
            ORDER BY completed_at DESC
            "
        ))
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;
        rows.iter().map(map_sitting_row).collect()
    }
}
