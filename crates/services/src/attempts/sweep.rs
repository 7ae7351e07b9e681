use std::collections::HashMap;
use std::sync::Arc;

use quiz_core::model::{QuizId, QuizPolicy, SittingId};
use storage::repository::{QuizCatalog, SittingRepository};

use super::{Actor, AttemptService, FinalizeOutcome};
use crate::error::QuizError;

#[derive(Debug, Default)]
pub struct SweepReport {
    pub finalized: Vec<FinalizeOutcome>,
    pub failed: Vec<(SittingId, QuizError)>,
    pub still_running: usize,
}

/// Proactively finalizes in-progress sittings whose time limit has elapsed.
///
/// Lazy finalization on access does not depend on this running.
#[derive(Clone)]
pub struct ExpirySweeper {
    catalog: Arc<dyn QuizCatalog>,
    sittings: Arc<dyn SittingRepository>,
    attempts: AttemptService,
}

impl ExpirySweeper {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn QuizCatalog>,
        sittings: Arc<dyn SittingRepository>,
        attempts: AttemptService,
    ) -> Self {
        Self {
            catalog,
            sittings,
            attempts,
        }
    }

    /// Sittings are finalized as their owners. Retention follows the sitting:
    /// exam papers and staff previews are kept, other sittings are discarded
    /// once their result is recorded.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` only if the active sittings cannot be listed;
    /// per-sitting failures are collected in the report.
    pub async fn sweep(&self) -> Result<SweepReport, QuizError> {
        let now = self.attempts.clock().now();
        let mut policies: HashMap<QuizId, QuizPolicy> = HashMap::new();
        let mut report = SweepReport::default();

        for sitting in self.sittings.list_active().await? {
            let quiz_id = sitting.quiz_id();
            if !policies.contains_key(&quiz_id) {
                match self.catalog.get_policy(quiz_id).await {
                    Ok(policy) => {
                        policies.insert(quiz_id, policy);
                    }
                    Err(err) => {
                        report.failed.push((sitting.id(), err.into()));
                        continue;
                    }
                }
            }
            let Some(policy) = policies.get(&quiz_id) else {
                continue;
            };
            if !sitting.is_time_expired(policy.time_limit(), now) {
                report.still_running += 1;
                continue;
            }

            let owner = if sitting.is_staff_preview() {
                Actor::staff(sitting.learner_id())
            } else {
                Actor::learner(sitting.learner_id())
            };
            match self.attempts.finalize_expired(owner, sitting.id()).await {
                Ok(outcome) => report.finalized.push(outcome),
                Err(err) => {
                    tracing::warn!(sitting_id = %sitting.id(), error = %err, "sweep could not finalize sitting");
                    report.failed.push((sitting.id(), err));
                }
            }
        }

        tracing::info!(
            finalized = report.finalized.len(),
            failed = report.failed.len(),
            still_running = report.still_running,
            "expiry sweep finished"
        );
        Ok(report)
    }
}
