//! `FlowStepRun`: one row per step executed within a [`super::FlowRun`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Classify, ErrorKind};
use crate::ids::{FlowRunId, FlowStepRunId, LlmRequestId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStepRunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowStepRun {
    pub id: FlowStepRunId,
    pub flow_run_id: FlowRunId,
    pub step_name: String,
    /// 1-based, unique within the owning flow.
    pub step_order: u32,
    pub status: FlowStepRunStatus,
    pub inputs: serde_json::Value,
    pub outputs: Option<serde_json::Value>,
    pub step_metadata: Option<serde_json::Value>,
    pub tokens_used: i64,
    pub cost_estimate: f64,
    pub execution_time_ms: Option<i64>,
    pub error_type: Option<ErrorKind>,
    pub error_message: Option<String>,
    /// The single LLM request this step made, when it made exactly one.
    /// Multi-call steps leave this null; the association lives in the
    /// request log instead.
    pub llm_request_id: Option<LlmRequestId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowStepRun {
    #[must_use]
    pub fn new(flow_run_id: FlowRunId, step_name: impl Into<String>, step_order: u32, inputs: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: FlowStepRunId::new(),
            flow_run_id,
            step_name: step_name.into(),
            step_order,
            status: FlowStepRunStatus::Pending,
            inputs,
            outputs: None,
            step_metadata: None,
            tokens_used: 0,
            cost_estimate: 0.0,
            execution_time_ms: None,
            error_type: None,
            error_message: None,
            llm_request_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = FlowStepRunStatus::Running;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self, outputs: serde_json::Value, execution_time_ms: i64) {
        self.status = FlowStepRunStatus::Completed;
        self.outputs = Some(outputs);
        self.execution_time_ms = Some(execution_time_ms);
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, error: &impl Classify, message: impl Into<String>) {
        self.status = FlowStepRunStatus::Failed;
        self.error_type = Some(error.classify());
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }

    pub fn mark_skipped(&mut self) {
        self.status = FlowStepRunStatus::Skipped;
        self.updated_at = Utc::now();
    }

    pub fn accumulate_usage(&mut self, tokens: i64, cost: f64) {
        self.tokens_used += tokens;
        self.cost_estimate += cost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_step_starts_pending_with_zero_usage() {
        let step = FlowStepRun::new(FlowRunId::new(), "extract_unit_metadata", 1, serde_json::json!({}));
        assert_eq!(step.status, FlowStepRunStatus::Pending);
        assert_eq!(step.tokens_used, 0);
        assert!(step.llm_request_id.is_none());
    }

    #[test]
    fn accumulate_usage_sums_across_calls() {
        let mut step = FlowStepRun::new(FlowRunId::new(), "generate_mcqs", 3, serde_json::json!({}));
        step.accumulate_usage(100, 0.002);
        step.accumulate_usage(50, 0.001);
        assert_eq!(step.tokens_used, 150);
        assert!((step.cost_estimate - 0.003).abs() < f64::EPSILON);
    }
}
