//! Read-only projections over flow runs, steps, and LLM requests, joined so
//! an HTTP handler can render a response without composing `Store` calls
//! itself (`spec.md` §4.6).

use std::sync::Arc;

use serde::Serialize;

use crate::domain::{FlowRun, FlowStepRun, LlmRequest};
use crate::ids::{FlowRunId, FlowStepRunId, LlmRequestId};
use crate::store::Store;

use super::error::AdminError;

/// One row of `GET /api/v1/admin/flows`, with the roll-up totals summed
/// from its `FlowStepRun` children.
#[derive(Debug, Clone, Serialize)]
pub struct FlowRunSummary {
    pub flow_run: FlowRun,
    pub total_tokens: i64,
    pub total_cost: f64,
    pub step_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowRunListPage {
    pub items: Vec<FlowRunSummary>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// `GET /api/v1/admin/flows/{flow_run_id}`: the run plus its steps in
/// execution order.
#[derive(Debug, Clone, Serialize)]
pub struct FlowRunDetail {
    pub flow_run: FlowRun,
    pub steps: Vec<FlowStepRun>,
}

pub struct AdminReadModel {
    store: Arc<dyn Store>,
}

impl AdminReadModel {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Newest-first page of flow runs with roll-up totals (`spec.md` §4.6).
    pub async fn list_flow_runs(&self, page: u32, page_size: u32) -> Result<FlowRunListPage, AdminError> {
        let paged = self.store.list_flow_runs(page, page_size).await?;
        let mut items = Vec::with_capacity(paged.runs.len());
        for flow_run in paged.runs {
            let steps = self.store.list_flow_step_runs(flow_run.id).await?;
            let total_tokens = steps.iter().map(|s| s.tokens_used).sum();
            let total_cost = steps.iter().map(|s| s.cost_estimate).sum();
            let step_count = u32::try_from(steps.len()).unwrap_or(u32::MAX);
            items.push(FlowRunSummary { flow_run, total_tokens, total_cost, step_count });
        }
        Ok(FlowRunListPage { items, total: paged.total, page, page_size })
    }

    pub async fn get_flow_run_detail(&self, flow_run_id: FlowRunId) -> Result<FlowRunDetail, AdminError> {
        let flow_run = self.store.get_flow_run(flow_run_id).await?;
        let mut steps = self.store.list_flow_step_runs(flow_run_id).await?;
        steps.sort_by_key(|s| s.step_order);
        Ok(FlowRunDetail { flow_run, steps })
    }

    /// `GET /api/v1/admin/flows/{flow_run_id}/steps/{step_run_id}`, scoped to
    /// the parent so a mismatched pair 404s rather than leaking another
    /// flow's step.
    pub async fn get_flow_step_run(&self, flow_run_id: FlowRunId, step_run_id: FlowStepRunId) -> Result<FlowStepRun, AdminError> {
        let step = self.store.get_flow_step_run(step_run_id).await?;
        if step.flow_run_id != flow_run_id {
            return Err(AdminError::NotFound { kind: "flow_step_run", id: step_run_id.to_string() });
        }
        Ok(step)
    }

    pub async fn get_llm_request(&self, request_id: LlmRequestId) -> Result<LlmRequest, AdminError> {
        Ok(self.store.get_llm_request(request_id).await?)
    }
}
