use quiz_core::model::{CourseId, LearnerId, QuizId, SittingId, SittingResult};
use sqlx::Row;

use super::mapping::{id_i64, map_record_row, ser};
use super::{SqliteRepository, conn_err};
use crate::repository::{AttemptRecordRepository, StorageError};

#[async_trait::async_trait]
impl AttemptRecordRepository for SqliteRepository {
    async fn get_record(&self, sitting_id: SittingId) -> Result<Option<SittingResult>, StorageError> {
        let row = sqlx::query("SELECT payload FROM attempt_records WHERE sitting_id = ?1")
            .bind(sitting_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn_err)?;
        row.as_ref().map(map_record_row).transpose()
    }

    async fn count_attempts(
        &self,
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
        .fetch_one(&self.pool)
        .await
        .map_err(conn_err)?;
        let used: i64 = row.try_get("used").map_err(ser)?;
        u32::try_from(used).map_err(ser)
    }

    async fn list_for_learner(
        &self,
        learner_id: LearnerId,
        quiz_id: QuizId,
    ) -> Result<Vec<SittingResult>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT payload
            FROM attempt_records
            WHERE learner_id = ?1 AND quiz_id = ?2
            ORDER BY completed_at ASC, attempt_number ASC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;
        rows.iter().map(map_record_row).collect()
    }

    async fn list_all_for_learner(&self, learner_id: LearnerId) -> Result<Vec<SittingResult>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT payload
            FROM attempt_records
            WHERE learner_id = ?1
            ORDER BY completed_at ASC, quiz_id ASC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;
        rows.iter().map(map_record_row).collect()
    }

    async fn list_for_quiz(&self, quiz_id: QuizId) -> Result<Vec<SittingResult>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT payload
            FROM attempt_records
            WHERE quiz_id = ?1
            ORDER BY completed_at ASC, learner_id ASC
            ",
        )
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;
        rows.iter().map(map_record_row).collect()
    }
}
