#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    Admission, AttemptRecordRepository, Completion, CompletionOutcome, EnrollmentRepository,
    InMemoryRepository, ProgressRepository, QuizCatalog, SittingRepository, Storage, StorageError,
};
