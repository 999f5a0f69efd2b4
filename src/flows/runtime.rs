//! Drives one top-level flow: creates the [`FlowRun`] row, runs the caller's
//! step sequence while ticking a heartbeat, and finalizes the row on
//! completion, cancellation, or failure (`spec.md` §4.3, §5, §8).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::error::FlowError;
use crate::domain::{ExecutionMode, FlowRun, FlowRunStatus, FlowStepRun};
use crate::error::{Classify, ErrorKind};
use crate::ids::FlowRunId;
use crate::store::Store;

pub struct FlowRuntime;

impl FlowRuntime {
    /// Runs `body` to completion, persisting a heartbeat on `heartbeat_interval`
    /// and finalizing the run's terminal status once `body` resolves.
    #[instrument(skip(store, body), fields(flow = flow_name), err)]
    pub async fn execute<F, Fut>(
        store: Arc<dyn Store>,
        flow_name: &'static str,
        execution_mode: ExecutionMode,
        user_id: Option<String>,
        inputs: serde_json::Value,
        total_steps: u32,
        heartbeat_interval: Duration,
        cancellation: CancellationToken,
        body: F,
    ) -> (FlowRunId, Result<serde_json::Value, FlowError>)
    where
        F: FnOnce(FlowRunId) -> Fut,
        Fut: Future<Output = Result<serde_json::Value, FlowError>>,
    {
        let mut run = FlowRun::new(flow_name, execution_mode, inputs, total_steps);
        run.user_id = user_id;
        run.mark_running();
        let run_id = run.id;
        if let Err(error) = store.insert_flow_run(&run).await {
            return (run_id, Err(error.into()));
        }

        let body_future = body(run_id);
        tokio::pin!(body_future);

        let mut ticker = tokio::time::interval(heartbeat_interval);
        ticker.tick().await; // first tick fires immediately; consume it up front

        let outcome = loop {
            tokio::select! {
                result = &mut body_future => break result,
                _ = ticker.tick() => {
                    if cancellation.is_cancelled() {
                        break Err(FlowError::Cancelled);
                    }
                    // Reload first: steps running inside `body` write their own
                    // progress directly to this row, and a stale in-memory `run`
                    // here would otherwise stomp `step_progress` back down on
                    // every tick (`spec.md` §8: step_progress is monotonic).
                    if let Ok(latest) = store.get_flow_run(run_id).await {
                        run = latest;
                    }
                    run.touch_heartbeat();
                    store.update_flow_run(&run).await.ok();
                }
            }
        };

        // Reload before finalizing: the body may have written directly to this
        // row (e.g. to append a fanned-out child's id under `flow_metadata`)
        // while it ran, and the terminal write below must not clobber that.
        if let Ok(latest) = store.get_flow_run(run_id).await {
            run = latest;
        }

        // Sum from the persisted step rows rather than trusting an
        // incrementally-maintained counter, so a crash mid-flow still leaves
        // `total_tokens`/`total_cost` consistent with whatever steps actually
        // ran (`spec.md` §8 token/cost invariant).
        if let Ok(steps) = store.list_flow_step_runs(run_id).await {
            run.total_tokens = steps.iter().map(|s| s.tokens_used).sum();
            run.total_cost = steps.iter().map(|s| s.cost_estimate).sum();

            // `spec.md` §8 scenario 4: cancelling a flow leaves the in-flight
            // step `failed`/`cancelled` (already persisted by the step
            // runtime) but the steps after it never got an inserted row at
            // all. Backfill those as `skipped` so the audit trail accounts
            // for every planned step, not just the ones that started.
            if matches!(outcome.as_ref().err().map(Classify::classify), Some(ErrorKind::Cancelled)) {
                let highest_order = steps.iter().map(|s| s.step_order).max().unwrap_or(0);
                for order in (highest_order + 1)..=total_steps {
                    let mut skipped = FlowStepRun::new(run_id, "skipped", order, serde_json::Value::Null);
                    skipped.mark_skipped();
                    store.insert_flow_step_run(&skipped).await.ok();
                }
            }
        }

        match outcome {
            Ok(outputs) => {
                run.outputs = Some(outputs.clone());
                run.mark_terminal(FlowRunStatus::Completed, None);
                match store.update_flow_run(&run).await {
                    Ok(()) => (run_id, Ok(outputs)),
                    Err(error) => (run_id, Err(error.into())),
                }
            }
            Err(error) => {
                let status = if matches!(error, FlowError::Cancelled) {
                    FlowRunStatus::Cancelled
                } else {
                    FlowRunStatus::Failed
                };
                run.mark_terminal(status, Some(error.to_string()));
                store.update_flow_run(&run).await.ok();
                (run_id, Err(error))
            }
        }
    }

    /// Appends a fanned-out child's id to the parent's
    /// `flow_metadata.child_flow_runs` (`spec.md` §4.3).
    pub async fn record_child_flow_run(store: &dyn Store, parent_id: FlowRunId, child_id: FlowRunId) -> Result<(), FlowError> {
        let mut run = store.get_flow_run(parent_id).await?;
        let mut children = run.flow_metadata["child_flow_runs"].as_array().cloned().unwrap_or_default();
        children.push(serde_json::json!(child_id.to_string()));
        run.flow_metadata["child_flow_runs"] = serde_json::Value::Array(children);
        store.update_flow_run(&run).await?;
        Ok(())
    }

    /// Appends a `{index, title, error}` entry to the parent's
    /// `flow_metadata.lesson_errors` (`spec.md` §4.3 partial-failure policy).
    pub async fn record_lesson_error(store: &dyn Store, parent_id: FlowRunId, index: usize, title: &str, error: &str) -> Result<(), FlowError> {
        let mut run = store.get_flow_run(parent_id).await?;
        let mut errors = run.flow_metadata["lesson_errors"].as_array().cloned().unwrap_or_default();
        errors.push(serde_json::json!({ "index": index, "title": title, "error": error }));
        run.flow_metadata["lesson_errors"] = serde_json::Value::Array(errors);
        store.update_flow_run(&run).await?;
        Ok(())
    }
}
