use std::collections::BTreeMap;

use quiz_core::model::{CategoryScore, LearnerId, Progress};
use sqlx::Row;

use super::mapping::{category_id_from_i64, id_i64, ser};
use super::{SqliteRepository, conn_err};
use crate::repository::{ProgressRepository, StorageError};

fn u32_col(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<u32, StorageError> {
    let v: i64 = row.try_get(column).map_err(ser)?;
    u32::try_from(v).map_err(ser)
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(&self, learner_id: LearnerId) -> Result<Progress, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT category_id, correct, total
            FROM progress
            WHERE learner_id = ?1
            ORDER BY category_id ASC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;

        let mut categories = BTreeMap::new();
        for row in &rows {
            let category = category_id_from_i64(row.try_get("category_id").map_err(ser)?)?;
            categories.insert(
                category,
                CategoryScore {
                    correct: u32_col(row, "correct")?,
                    total: u32_col(row, "total")?,
                },
            );
        }
        Ok(Progress::from_persisted(learner_id, categories))
    }
}
