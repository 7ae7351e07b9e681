use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::attempts::{
    AdmissionController, AttemptService, ExpirySweeper, MarkingService, ReportService,
    ReviewService,
};
use crate::catalog_service::CatalogService;
use crate::error::AppServicesError;

/// Assembles the quiz services over one storage backend.
///
/// The admission controller, the sweeper and the answer loop share a single
/// `AttemptService`, so they also share its per-sitting locks.
#[derive(Clone)]
pub struct QuizServices {
    catalog: Arc<CatalogService>,
    admission: Arc<AdmissionController>,
    attempts: Arc<AttemptService>,
    review: Arc<ReviewService>,
    marking: Arc<MarkingService>,
    reports: Arc<ReportService>,
    sweeper: Arc<ExpirySweeper>,
}

impl QuizServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if connecting or migrating fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, None))
    }

    /// Wire every service to `storage`. A `shuffle_seed` makes random
    /// question orders reproducible.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, shuffle_seed: Option<u64>) -> Self {
        let attempts = AttemptService::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.sittings),
            Arc::clone(&storage.attempts),
        );
        let admission = AdmissionController::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.sittings),
            attempts.clone(),
        )
        .with_shuffle_seed(shuffle_seed);
        let sweeper = ExpirySweeper::new(
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.sittings),
            attempts.clone(),
        );

        Self {
            catalog: Arc::new(CatalogService::new(
                Arc::clone(&storage.catalog),
                Arc::clone(&storage.enrollments),
            )),
            admission: Arc::new(admission),
            attempts: Arc::new(attempts),
            review: Arc::new(ReviewService::new(
                clock,
                Arc::clone(&storage.catalog),
                Arc::clone(&storage.sittings),
                Arc::clone(&storage.attempts),
            )),
            marking: Arc::new(MarkingService::new(
                Arc::clone(&storage.catalog),
                Arc::clone(&storage.sittings),
                Arc::clone(&storage.attempts),
            )),
            reports: Arc::new(ReportService::new(
                clock,
                Arc::clone(&storage.catalog),
                Arc::clone(&storage.enrollments),
                Arc::clone(&storage.attempts),
                Arc::clone(&storage.progress),
            )),
            sweeper: Arc::new(sweeper),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn admission(&self) -> Arc<AdmissionController> {
        Arc::clone(&self.admission)
    }

    #[must_use]
    pub fn attempts(&self) -> Arc<AttemptService> {
        Arc::clone(&self.attempts)
    }

    #[must_use]
    pub fn review(&self) -> Arc<ReviewService> {
        Arc::clone(&self.review)
    }

    #[must_use]
    pub fn marking(&self) -> Arc<MarkingService> {
        Arc::clone(&self.marking)
    }

    #[must_use]
    pub fn reports(&self) -> Arc<ReportService> {
        Arc::clone(&self.reports)
    }

    #[must_use]
    pub fn sweeper(&self) -> Arc<ExpirySweeper> {
        Arc::clone(&self.sweeper)
    }
}
