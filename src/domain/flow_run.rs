//! `FlowRun`: one row per top-level orchestration (`spec.md` §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::FlowRunId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sync,
    Background,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowRunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl FlowRunStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowRun {
    pub id: FlowRunId,
    pub flow_name: String,
    pub execution_mode: ExecutionMode,
    pub user_id: Option<String>,
    pub status: FlowRunStatus,
    pub inputs: serde_json::Value,
    pub outputs: Option<serde_json::Value>,
    pub flow_metadata: serde_json::Value,
    pub current_step: Option<String>,
    pub step_progress: u32,
    pub total_steps: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<i64>,
    pub total_tokens: i64,
    pub total_cost: f64,
    pub error_message: Option<String>,
}

impl FlowRun {
    #[must_use]
    pub fn new(flow_name: impl Into<String>, execution_mode: ExecutionMode, inputs: serde_json::Value, total_steps: u32) -> Self {
        Self {
            id: FlowRunId::new(),
            flow_name: flow_name.into(),
            execution_mode,
            user_id: None,
            status: FlowRunStatus::Pending,
            inputs,
            outputs: None,
            flow_metadata: serde_json::json!({}),
            current_step: None,
            step_progress: 0,
            total_steps,
            started_at: None,
            completed_at: None,
            last_heartbeat: None,
            execution_time_ms: None,
            total_tokens: 0,
            total_cost: 0.0,
            error_message: None,
        }
    }

    /// `progress_percentage = 100 * step_progress / total_steps` when
    /// `total_steps > 0` (`spec.md` §3 invariant).
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        if self.total_steps == 0 {
            0.0
        } else {
            100.0 * f64::from(self.step_progress) / f64::from(self.total_steps)
        }
    }

    pub fn mark_running(&mut self) {
        self.status = FlowRunStatus::Running;
        let now = Utc::now();
        self.started_at.get_or_insert(now);
        self.last_heartbeat = Some(now);
    }

    pub fn mark_terminal(&mut self, status: FlowRunStatus, error_message: Option<String>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.error_message = error_message;
        let now = Utc::now();
        self.completed_at = Some(now);
        if let Some(started) = self.started_at {
            self.execution_time_ms = Some((now - started).num_milliseconds());
        }
    }

    pub fn touch_heartbeat(&mut self) {
        self.last_heartbeat = Some(Utc::now());
    }
}
