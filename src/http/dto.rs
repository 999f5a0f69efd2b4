//! Request/response bodies for the `/api/v1` surface (`spec.md` §6).

use serde::{Deserialize, Serialize};

use crate::domain::{LearnerLevel, UnitFlowType, UnitStatus};
use crate::ids::UnitId;
use crate::jobs::SubmitOutcome;
use crate::orchestrator::UnitCreationRequest;

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateUnitBody {
    pub topic: Option<String>,
    pub source_material: Option<String>,
    pub target_lesson_count: u32,
    pub learner_level: LearnerLevel,
    #[serde(default)]
    pub background: bool,
    pub flow_type: UnitFlowType,
}

impl CreateUnitBody {
    /// Builds the orchestrator's request, deriving `learner_desires` from
    /// whichever of `topic`/`source_material` the caller supplied — the
    /// core always wants a short description to drive metadata extraction,
    /// even on the supplied-material path.
    pub fn into_request(self, user_id: Option<String>) -> Result<UnitCreationRequest, ApiError> {
        let learner_desires = match (&self.topic, &self.source_material) {
            (Some(topic), _) if !topic.trim().is_empty() => topic.clone(),
            (_, Some(material)) if !material.trim().is_empty() => material.chars().take(200).collect(),
            _ => {
                return Err(ApiError(crate::jobs::JobError::Validation("either topic or source_material is required".to_string()).into()));
            }
        };
        Ok(UnitCreationRequest {
            learner_desires,
            coach_learning_objectives: None,
            source_material: self.source_material,
            target_lesson_count: self.target_lesson_count,
            learner_level: self.learner_level,
            flow_type: self.flow_type,
            user_id,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CreateUnitAccepted {
    pub unit_id: UnitId,
    pub status: UnitStatus,
}

impl From<SubmitOutcome> for CreateUnitResponse {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Accepted { unit_id, status } => Self::Accepted(CreateUnitAccepted { unit_id, status }),
            SubmitOutcome::Completed(unit) => Self::Completed(unit),
        }
    }
}

/// Tagged so the route handler can pick 200 vs 202 without re-matching on
/// `SubmitOutcome` itself.
pub enum CreateUnitResponse {
    Accepted(CreateUnitAccepted),
    Completed(Box<crate::domain::Unit>),
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    20
}
