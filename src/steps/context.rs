//! Per-flow-run handle threaded through every step execution.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::ids::{FlowRunId, LlmRequestId};
use crate::llm::LlmGateway;
use crate::store::Store;

#[derive(Default)]
struct StepUsage {
    tokens: i64,
    cost: f64,
    last_request_id: Option<LlmRequestId>,
}

#[derive(Clone)]
pub struct StepContext {
    pub llm: Arc<LlmGateway>,
    pub store: Arc<dyn Store>,
    pub flow_run_id: FlowRunId,
    pub user_id: Option<String>,
    pub cancellation: CancellationToken,
    usage: Arc<Mutex<StepUsage>>,
}

impl StepContext {
    #[must_use]
    pub fn new(
        llm: Arc<LlmGateway>,
        store: Arc<dyn Store>,
        flow_run_id: FlowRunId,
        user_id: Option<String>,
        cancellation: CancellationToken,
    ) -> Self {
        Self { llm, store, flow_run_id, user_id, cancellation, usage: Arc::new(Mutex::new(StepUsage::default())) }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Folds one LLM call's usage into the running total for the step
    /// currently executing. A step that retries once (`spec.md` §4.2) charges
    /// both attempts, since both are real calls against the provider.
    pub fn record_llm_usage(&self, request_id: LlmRequestId, tokens: i64, cost: f64) {
        let mut usage = self.usage.lock();
        usage.tokens += tokens;
        usage.cost += cost;
        usage.last_request_id = Some(request_id);
    }

    /// Drains the accumulated usage since the last drain. Called by
    /// [`super::runtime::StepRuntime`] right after a step's `execute` settles,
    /// so usage never leaks across steps sharing the same context.
    pub(crate) fn take_usage(&self) -> (i64, f64, Option<LlmRequestId>) {
        let mut usage = self.usage.lock();
        let drained = (usage.tokens, usage.cost, usage.last_request_id);
        *usage = StepUsage::default();
        drained
    }
}
