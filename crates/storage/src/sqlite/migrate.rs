use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS quizzes (
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            ordering TEXT NOT NULL,
            reveal TEXT NOT NULL,
            pass_mark INTEGER NOT NULL CHECK (pass_mark BETWEEN 0 AND 100),
            attempt_ceiling INTEGER NOT NULL CHECK (attempt_ceiling >= 1),
            draft INTEGER NOT NULL,
            exam_paper INTEGER NOT NULL,
            available_from TEXT,
            available_until TEXT,
            time_limit_secs INTEGER CHECK (time_limit_secs IS NULL OR time_limit_secs > 0),
            review_after_submission INTEGER NOT NULL,
            answers_visible_after TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY,
            quiz_id INTEGER NOT NULL,
            category_id INTEGER,
            prompt TEXT NOT NULL,
            explanation TEXT NOT NULL,
            kind TEXT NOT NULL,
            FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS enrollments (
            course_id INTEGER NOT NULL,
            learner_id INTEGER NOT NULL,
            PRIMARY KEY (course_id, learner_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS sittings (
            id TEXT PRIMARY KEY,
            learner_id INTEGER NOT NULL,
            quiz_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            attempt_number INTEGER NOT NULL CHECK (attempt_number >= 1),
            question_order TEXT NOT NULL,
            remaining TEXT NOT NULL,
            answers TEXT NOT NULL,
            incorrect TEXT NOT NULL,
            ungraded TEXT NOT NULL,
            correct_count INTEGER NOT NULL CHECK (correct_count >= 0),
            started_at TEXT NOT NULL,
            completed_at TEXT,
            forced INTEGER NOT NULL,
            revision INTEGER NOT NULL,
            FOREIGN KEY (quiz_id) REFERENCES quizzes(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_sittings_one_active
            ON sittings (learner_id, quiz_id, course_id)
            WHERE completed_at IS NULL;
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_sittings_quiz_completed
            ON sittings (quiz_id, completed_at);
    ",
    r"
        CREATE TABLE IF NOT EXISTS attempt_records (
            sitting_id TEXT PRIMARY KEY,
            learner_id INTEGER NOT NULL,
            quiz_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            attempt_number INTEGER NOT NULL,
            score_percent INTEGER NOT NULL CHECK (score_percent BETWEEN 0 AND 100),
            passed INTEGER NOT NULL,
            completed_at TEXT NOT NULL,
            payload TEXT NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_attempt_records_learner_quiz
            ON attempt_records (learner_id, quiz_id, course_id, completed_at);
    ",
    r"
        CREATE TABLE IF NOT EXISTS progress (
            learner_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            correct INTEGER NOT NULL CHECK (correct >= 0),
            total INTEGER NOT NULL CHECK (total >= correct),
            PRIMARY KEY (learner_id, category_id)
        );
    ",
];

const SCHEMA_V2: &[&str] = &[r"
        ALTER TABLE sittings ADD COLUMN staff_preview INTEGER NOT NULL DEFAULT 0;
    "];

const MIGRATIONS: &[(i64, &[&str])] = &[(1, SCHEMA_V1), (2, SCHEMA_V2)];

/// Runs versioned migrations for the quiz schema.
///
/// Version 1 creates quizzes, questions, enrollments, sittings (with the
/// one-active-sitting partial index), the attempt ledger and progress.
/// Version 2 records whether a sitting was admitted as a staff preview.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    for &(version, statements) in MIGRATIONS {
        if is_applied(pool, version).await? {
            continue;
        }
        let mut tx = pool.begin().await?;
        for statement in statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!(version, "applied schema migration");
    }

    Ok(())
}
