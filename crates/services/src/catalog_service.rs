use std::sync::Arc;

use quiz_core::model::{CourseId, LearnerId, Question, QuestionBank, QuizId, QuizPolicy};
use storage::repository::{EnrollmentRepository, QuizCatalog, StorageError};

use crate::error::{QuizError, not_found};

/// Authoring and enrollment: the read-only inputs of the attempt engine.
#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn QuizCatalog>,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(catalog: Arc<dyn QuizCatalog>, enrollments: Arc<dyn EnrollmentRepository>) -> Self {
        Self {
            catalog,
            enrollments,
        }
    }

    /// Creates or replaces a quiz policy.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if persistence fails.
    pub async fn publish_policy(&self, policy: &QuizPolicy) -> Result<(), QuizError> {
        self.catalog.upsert_policy(policy).await?;
        tracing::info!(quiz_id = %policy.id(), title = policy.title(), "quiz policy saved");
        Ok(())
    }

    /// Adds or edits a question of an existing quiz.
    ///
    /// # Errors
    ///
    /// - `QuizError::NotFound` if the quiz does not exist.
    /// - `QuizError::Forbidden` while any sitting of the quiz is in progress, or
    ///   when the question id already belongs to another quiz.
    pub async fn save_question(&self, question: &Question) -> Result<(), QuizError> {
        match self.catalog.upsert_question(question).await {
            Ok(()) => Ok(()),
            Err(StorageError::Conflict) => {
                tracing::warn!(
                    quiz_id = %question.quiz_id(),
                    question_id = %question.id(),
                    "question edit rejected: quiz has an in-progress sitting or the id belongs to another quiz"
                );
                Err(QuizError::Forbidden)
            }
            Err(err) => Err(not_found(format!("quiz {}", question.quiz_id()))(err)),
        }
    }

    /// # Errors
    ///
    /// Returns `QuizError::NotFound` for an unknown quiz.
    pub async fn policy(&self, quiz_id: QuizId) -> Result<QuizPolicy, QuizError> {
        self.catalog
            .get_policy(quiz_id)
            .await
            .map_err(not_found(format!("quiz {quiz_id}")))
    }

    /// # Errors
    ///
    /// Returns `QuizError::Storage` if repository access fails.
    pub async fn list_quizzes(&self, course_id: CourseId) -> Result<Vec<QuizPolicy>, QuizError> {
        Ok(self.catalog.list_policies(course_id).await?)
    }

    /// # Errors
    ///
    /// Returns `QuizError::Storage` if repository access fails.
    pub async fn question_bank(&self, quiz_id: QuizId) -> Result<QuestionBank, QuizError> {
        Ok(QuestionBank::new(self.catalog.list_questions(quiz_id).await?))
    }

    /// Enrolls a learner; enrolling twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if persistence fails.
    pub async fn enroll(&self, learner_id: LearnerId, course_id: CourseId) -> Result<(), QuizError> {
        self.enrollments.enroll(learner_id, course_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{QuestionId, QuestionKind};
    use storage::repository::Storage;

    fn catalog(storage: &Storage) -> CatalogService {
        CatalogService::new(Arc::clone(&storage.catalog), Arc::clone(&storage.enrollments))
    }

    #[tokio::test]
    async fn question_for_unknown_quiz_is_not_found() {
        let storage = Storage::in_memory();
        let service = catalog(&storage);
        let question = Question::new(
            QuestionId::new(1),
            QuizId::new(42),
            "Orphan?",
            "",
            QuestionKind::TrueFalse { answer: true },
        )
        .unwrap();

        let err = service.save_question(&question).await.unwrap_err();
        assert!(matches!(err, QuizError::NotFound(_)));
    }

    #[tokio::test]
    async fn published_quiz_is_listed_for_its_course() {
        let storage = Storage::in_memory();
        let service = catalog(&storage);
        let policy = QuizPolicy::builder(QuizId::new(1), CourseId::new(7), "Listed")
            .build()
            .unwrap();
        service.publish_policy(&policy).await.unwrap();

        let listed = service.list_quizzes(CourseId::new(7)).await.unwrap();
        assert_eq!(listed, vec![policy]);
        assert!(service.list_quizzes(CourseId::new(8)).await.unwrap().is_empty());
    }
}
