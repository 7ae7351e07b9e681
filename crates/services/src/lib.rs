#![forbid(unsafe_code)]

pub mod app_services;
pub mod attempts;
pub mod catalog_service;
pub mod error;

pub use quiz_core::Clock;

pub use app_services::QuizServices;
pub use attempts::{
    ActivityEvent, Actor, AdmissionController, AnswerFormat, AttemptService, ExpirySweeper,
    FinalizeOutcome, LearnerResult, MarkingEntry, MarkingService, ProgressReport, QuestionView,
    QuizListing, QuizResults, ReportService, ReviewService, ReviewView, Role, SittingHandle,
    SweepReport,
};
pub use catalog_service::CatalogService;
pub use error::{AppServicesError, NotAvailableReason, QuizError};
