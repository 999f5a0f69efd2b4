//! Job submission: validates a creation request, allocates the `Unit` row,
//! and either runs the flow to completion (`background = false`) or hands it
//! off to a background task and returns immediately (`background = true`),
//! per the `POST /api/v1/units` contract (`spec.md` §4.5, §6).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::domain::{ExecutionMode, Unit, UnitStatus};
use crate::ids::UnitId;
use crate::orchestrator::{UnitCreationRequest, UnitOrchestrator};
use crate::store::Store;

use super::error::JobError;

const MAX_TARGET_LESSON_COUNT: u32 = 20;

/// What a submission call hands back: either the request was accepted to
/// run in the background, or (`background = false`) it ran to completion
/// and the terminal `Unit` is returned directly.
pub enum SubmitOutcome {
    Accepted { unit_id: UnitId, status: UnitStatus },
    Completed(Box<Unit>),
}

/// Bookkeeping the stall reconciler uses to notice a job whose
/// `creation_progress.phase` hasn't advanced within the stall window.
pub(super) struct TrackedJob {
    pub(super) cancellation: CancellationToken,
    pub(super) last_phase: String,
    pub(super) last_progress_at: Instant,
}

pub struct JobManager {
    pub(super) store: Arc<dyn Store>,
    orchestrator: Arc<UnitOrchestrator>,
    pub(super) stall_timeout: Duration,
    pub(super) tracked: Arc<RwLock<HashMap<UnitId, TrackedJob>>>,
}

impl JobManager {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, orchestrator: Arc<UnitOrchestrator>, stall_timeout: Duration) -> Self {
        Self { store, orchestrator, stall_timeout, tracked: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// `pending -> failed` is permitted when submission validation fails
    /// (`spec.md` §4.5); everything else goes through the normal lifecycle.
    fn validate(request: &UnitCreationRequest) -> Result<(), JobError> {
        if request.learner_desires.trim().is_empty() {
            return Err(JobError::Validation("learner_desires must not be empty".to_string()));
        }
        if request.target_lesson_count == 0 {
            return Err(JobError::Validation("target_lesson_count must be at least 1".to_string()));
        }
        if request.target_lesson_count > MAX_TARGET_LESSON_COUNT {
            return Err(JobError::Validation(format!("target_lesson_count must be at most {MAX_TARGET_LESSON_COUNT}")));
        }
        Ok(())
    }

    pub async fn submit(&self, request: UnitCreationRequest, background: bool) -> Result<SubmitOutcome, JobError> {
        Self::validate(&request)?;

        let unit = self.orchestrator.allocate_pending_unit(&request).await?;
        let unit_id = unit.id;
        let cancellation = CancellationToken::new();

        self.tracked.write().await.insert(
            unit_id,
            TrackedJob { cancellation: cancellation.clone(), last_phase: "unit_plan".to_string(), last_progress_at: Instant::now() },
        );

        let execution_mode = if background { ExecutionMode::Background } else { ExecutionMode::Sync };
        let orchestrator = self.orchestrator.clone();
        let tracked = self.tracked.clone();

        if background {
            tokio::spawn(async move {
                orchestrator.run_unit_creation(unit, request, execution_mode, cancellation).await.ok();
                tracked.write().await.remove(&unit_id);
            });
            return Ok(SubmitOutcome::Accepted { unit_id, status: UnitStatus::InProgress });
        }

        let result = orchestrator.run_unit_creation(unit, request, execution_mode, cancellation).await;
        tracked.write().await.remove(&unit_id);
        let completed_id = result?;
        let unit = self.store.get_unit(completed_id).await?;
        Ok(SubmitOutcome::Completed(Box::new(unit)))
    }
}
