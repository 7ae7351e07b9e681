use quiz_core::model::{CourseId, LearnerId};
use sqlx::Row;

use super::mapping::{id_i64, learner_id_from_i64, ser};
use super::{SqliteRepository, conn_err};
use crate::repository::{EnrollmentRepository, StorageError};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn enroll(&self, learner_id: LearnerId, course_id: CourseId) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO enrollments (course_id, learner_id)
            VALUES (?1, ?2)
            ON CONFLICT(course_id, learner_id) DO NOTHING
            ",
        )
        .bind(id_i64("course_id", course_id.value())?)
        .bind(id_i64("learner_id", learner_id.value())?)
        .execute(&self.pool)
        .await
        .map_err(conn_err)?;
        Ok(())
    }

    async fn is_enrolled(&self, learner_id: LearnerId, course_id: CourseId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM enrollments WHERE course_id = ?1 AND learner_id = ?2")
            .bind(id_i64("course_id", course_id.value())?)
            .bind(id_i64("learner_id", learner_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn_err)?;
        Ok(row.is_some())
    }

    async fn list_learners(&self, course_id: CourseId) -> Result<Vec<LearnerId>, StorageError> {
        let rows = sqlx::query(
            "SELECT learner_id FROM enrollments WHERE course_id = ?1 ORDER BY learner_id ASC",
        )
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;
        rows.iter()
            .map(|row| learner_id_from_i64(row.try_get("learner_id").map_err(ser)?))
            .collect()
    }
}
