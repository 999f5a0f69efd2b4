//! `Unit`: the top-level learning artifact a flow produces (`spec.md` §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{FlowRunId, ImageAssetId, AudioAssetId, UnitId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFlowType {
    Standard,
    Fast,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// A flow-local stable identifier (`lo_1`, `lo_2`, ...) and its text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LearningObjective {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub title: String,
    pub description: Option<String>,
    pub learner_level: LearnerLevel,
    pub learning_objectives: Vec<LearningObjective>,
    /// Ground truth for display order; every id here must reference an
    /// existing `Lesson` whose `unit_id` equals this unit's id.
    pub lesson_order: Vec<crate::ids::LessonId>,
    pub target_lesson_count: u32,
    pub generated_from_topic: bool,
    pub source_material: Option<String>,
    pub flow_type: UnitFlowType,
    pub status: UnitStatus,
    pub creation_progress: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub art_image_id: Option<ImageAssetId>,
    pub podcast_audio_id: Option<AudioAssetId>,
    pub podcast_transcript: Option<String>,
    pub owner_user_id: Option<String>,
    pub is_global: bool,
    pub originating_flow_run_id: Option<FlowRunId>,
}

impl Unit {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        learner_level: LearnerLevel,
        target_lesson_count: u32,
        flow_type: UnitFlowType,
    ) -> Self {
        Self {
            id: UnitId::new(),
            title: title.into(),
            description: None,
            learner_level,
            learning_objectives: Vec::new(),
            lesson_order: Vec::new(),
            target_lesson_count,
            generated_from_topic: true,
            source_material: None,
            flow_type,
            status: UnitStatus::Pending,
            creation_progress: None,
            error_message: None,
            art_image_id: None,
            podcast_audio_id: None,
            podcast_transcript: None,
            owner_user_id: None,
            is_global: false,
            originating_flow_run_id: None,
        }
    }

    /// `spec.md` §3 invariant: `completed` requires a non-empty lesson order.
    /// Checking that every referenced lesson has a non-empty package is the
    /// caller's job since that requires a join the domain type can't see.
    #[must_use]
    pub fn satisfies_completion_invariant(&self) -> bool {
        self.status != UnitStatus::Completed || !self.lesson_order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_unit_starts_pending_with_empty_lesson_order() {
        let unit = Unit::new("Intro to Rust", LearnerLevel::Beginner, 5, UnitFlowType::Standard);
        assert_eq!(unit.status, UnitStatus::Pending);
        assert!(unit.lesson_order.is_empty());
        assert!(unit.satisfies_completion_invariant());
    }

    #[test]
    fn completed_with_empty_lesson_order_violates_invariant() {
        let mut unit = Unit::new("Intro to Rust", LearnerLevel::Beginner, 5, UnitFlowType::Standard);
        unit.status = UnitStatus::Completed;
        assert!(!unit.satisfies_completion_invariant());
    }
}
