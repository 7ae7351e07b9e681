use quiz_core::model::{CourseId, Question, QuizId, QuizPolicy};
use sqlx::Row;

use super::mapping::{id_i64, map_policy_row, map_question_row, ser, to_json};
use super::{SqliteRepository, begin_immediate, conn_err};
use crate::repository::{QuizCatalog, StorageError};

const POLICY_COLUMNS: &str = r"
    id, course_id, title, ordering, reveal, pass_mark, attempt_ceiling, draft,
    exam_paper, available_from, available_until, time_limit_secs,
    review_after_submission, answers_visible_after
";

async fn insert_question(
    conn: &mut sqlx::SqliteConnection,
    question: &Question,
) -> Result<(), StorageError> {
    let quiz_id = id_i64("quiz_id", question.quiz_id().value())?;
    let quiz_exists = sqlx::query("SELECT 1 FROM quizzes WHERE id = ?1")
        .bind(quiz_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(conn_err)?;
    if quiz_exists.is_none() {
        return Err(StorageError::NotFound);
    }

    let owner = sqlx::query("SELECT quiz_id FROM questions WHERE id = ?1")
        .bind(id_i64("question_id", question.id().value())?)
        .fetch_optional(&mut *conn)
        .await
        .map_err(conn_err)?;
    if let Some(row) = owner {
        let owner: i64 = row.try_get("quiz_id").map_err(ser)?;
        if owner != quiz_id {
            return Err(StorageError::Conflict);
        }
    }

    let open = sqlx::query("SELECT 1 FROM sittings WHERE quiz_id = ?1 AND completed_at IS NULL LIMIT 1")
        .bind(quiz_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(conn_err)?;
    if open.is_some() {
        return Err(StorageError::Conflict);
    }

    sqlx::query(
        r"
        INSERT INTO questions (id, quiz_id, category_id, prompt, explanation, kind)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(id) DO UPDATE SET
            category_id = excluded.category_id,
            prompt = excluded.prompt,
            explanation = excluded.explanation,
            kind = excluded.kind
        ",
    )
    .bind(id_i64("question_id", question.id().value())?)
    .bind(quiz_id)
    .bind(
        question
            .category()
            .map(|c| id_i64("category_id", c.value()))
            .transpose()?,
    )
    .bind(question.prompt())
    .bind(question.explanation())
    .bind(to_json(question.kind())?)
    .execute(&mut *conn)
    .await
    .map_err(conn_err)?;
    Ok(())
}

#[async_trait::async_trait]
impl QuizCatalog for SqliteRepository {
    async fn upsert_policy(&self, policy: &QuizPolicy) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO quizzes (
                id, course_id, title, ordering, reveal, pass_mark, attempt_ceiling, draft,
                exam_paper, available_from, available_until, time_limit_secs,
                review_after_submission, answers_visible_after
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(id) DO UPDATE SET
                course_id = excluded.course_id,
                title = excluded.title,
                ordering = excluded.ordering,
                reveal = excluded.reveal,
                pass_mark = excluded.pass_mark,
                attempt_ceiling = excluded.attempt_ceiling,
                draft = excluded.draft,
                exam_paper = excluded.exam_paper,
                available_from = excluded.available_from,
                available_until = excluded.available_until,
                time_limit_secs = excluded.time_limit_secs,
                review_after_submission = excluded.review_after_submission,
                answers_visible_after = excluded.answers_visible_after
            ",
        )
        .bind(id_i64("quiz_id", policy.id().value())?)
        .bind(id_i64("course_id", policy.course_id().value())?)
        .bind(policy.title())
        .bind(policy.ordering().as_str())
        .bind(policy.reveal().as_str())
        .bind(i64::from(policy.pass_mark()))
        .bind(i64::from(policy.attempt_ceiling()))
        .bind(policy.is_draft())
        .bind(policy.is_exam_paper())
        .bind(policy.available_from())
        .bind(policy.available_until())
        .bind(policy.time_limit().map(|d| d.num_seconds()))
        .bind(policy.review_after_submission())
        .bind(policy.answers_visible_after())
        .execute(&self.pool)
        .await
        .map_err(conn_err)?;
        Ok(())
    }

    async fn get_policy(&self, id: QuizId) -> Result<QuizPolicy, StorageError> {
        let row = sqlx::query(&format!("SELECT {POLICY_COLUMNS} FROM quizzes WHERE id = ?1"))
            .bind(id_i64("quiz_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn_err)?
            .ok_or(StorageError::NotFound)?;
        map_policy_row(&row)
    }

    async fn list_policies(&self, course_id: CourseId) -> Result<Vec<QuizPolicy>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {POLICY_COLUMNS} FROM quizzes WHERE course_id = ?1 ORDER BY id ASC"
        ))
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;
        rows.iter().map(map_policy_row).collect()
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut tx = begin_immediate(&self.pool).await?;
        insert_question(&mut *tx, question).await?;
        tx.commit().await.map_err(conn_err)?;
        Ok(())
    }

    async fn list_questions(&self, quiz_id: QuizId) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, quiz_id, category_id, prompt, explanation, kind
            FROM questions
            WHERE quiz_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;
        rows.iter().map(map_question_row).collect()
    }
}
