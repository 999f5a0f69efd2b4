//! Drives one [`Step`] through the validate → execute → validate → repair →
//! persist contract, writing the [`FlowStepRun`] audit row at every
//! transition (`spec.md` §4.2, §8).

use std::time::Instant;

use tracing::instrument;

use super::context::StepContext;
use super::error::StepError;
use super::step::Step;
use crate::domain::FlowStepRun;

pub struct StepRuntime;

impl StepRuntime {
    #[instrument(skip(step, inputs, ctx), err)]
    pub async fn run<S: Step>(step: &S, inputs: S::Inputs, step_order: u32, ctx: &StepContext) -> Result<S::Outputs, StepError> {
        let inputs_json = serde_json::to_value(&inputs).unwrap_or(serde_json::Value::Null);
        let mut record = FlowStepRun::new(ctx.flow_run_id, step.name(), step_order, inputs_json);
        ctx.store.insert_flow_step_run(&record).await?;

        if let Err(message) = step.validate_inputs(&inputs) {
            let error = StepError::Validation(message.clone());
            record.mark_failed(&error, message);
            ctx.store.update_flow_step_run(&record).await?;
            return Err(error);
        }

        if ctx.is_cancelled() {
            record.mark_failed(&StepError::Cancelled, "cancelled before execution");
            ctx.store.update_flow_step_run(&record).await?;
            return Err(StepError::Cancelled);
        }

        record.mark_running();
        ctx.store.update_flow_step_run(&record).await?;

        let started = Instant::now();
        let mut outcome = step.execute(&inputs, ctx).await;

        if let Ok(value) = &outcome {
            if let Err(message) = step.validate_outputs(value) {
                tracing::warn!(step = step.name(), %message, "step output failed validation, retrying once");
                outcome = step.execute(&inputs, ctx).await;
                if let Ok(retried) = &outcome {
                    if let Err(message) = step.validate_outputs(retried) {
                        outcome = Err(StepError::InvalidResponse(message));
                    }
                }
            }
        }

        let elapsed = started.elapsed().as_millis() as i64;
        let (tokens, cost, request_id) = ctx.take_usage();
        if tokens != 0 || cost != 0.0 {
            record.accumulate_usage(tokens, cost);
        }
        if let Some(request_id) = request_id {
            record.llm_request_id = Some(request_id);
        }

        match outcome {
            Ok(value) => {
                let outputs_json = serde_json::to_value(&value).unwrap_or(serde_json::Value::Null);
                record.mark_completed(outputs_json, elapsed);
                ctx.store.update_flow_step_run(&record).await?;
                Self::bump_progress(ctx, step.name()).await;
                Ok(value)
            }
            Err(error) => {
                record.mark_failed(&error, error.to_string());
                record.execution_time_ms = Some(elapsed);
                ctx.store.update_flow_step_run(&record).await?;
                Err(error)
            }
        }
    }

    /// Advances `FlowRun.step_progress`/`current_step` on a completed step.
    /// Best-effort: a lost update here doesn't fail the step itself, since
    /// the `FlowStepRun` audit row (already persisted above) is the source
    /// of truth — this only drives the coarse progress counter (`spec.md`
    /// §8: "`FlowRun.step_progress` is monotonically non-decreasing").
    async fn bump_progress(ctx: &StepContext, step_name: &str) {
        if let Ok(mut run) = ctx.store.get_flow_run(ctx.flow_run_id).await {
            run.step_progress += 1;
            run.current_step = Some(step_name.to_string());
            ctx.store.update_flow_run(&run).await.ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::config::Config;
    use crate::ids::FlowRunId;
    use crate::llm::{LlmGateway, MockProvider};
    use crate::store::{InMemoryStore, Store};

    #[derive(Clone, Serialize, Deserialize)]
    struct TextIn {
        text: String,
    }

    #[derive(Clone, Serialize, Deserialize)]
    struct TextOut {
        text: String,
    }

    struct UppercaseStep;

    #[async_trait]
    impl Step for UppercaseStep {
        type Inputs = TextIn;
        type Outputs = TextOut;

        fn name(&self) -> &'static str {
            "uppercase"
        }

        async fn execute(&self, inputs: &Self::Inputs, _ctx: &StepContext) -> Result<Self::Outputs, StepError> {
            Ok(TextOut { text: inputs.text.to_uppercase() })
        }

        fn validate_inputs(&self, inputs: &Self::Inputs) -> Result<(), String> {
            super::super::validate::non_empty(&inputs.text, "text")
        }

        fn validate_outputs(&self, outputs: &Self::Outputs) -> Result<(), String> {
            super::super::validate::non_empty(&outputs.text, "text")
        }
    }

    /// Fails output validation on its first call, succeeds on the retry —
    /// exercises the one-repair-attempt contract.
    struct FlakyStep {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Step for FlakyStep {
        type Inputs = TextIn;
        type Outputs = TextOut;

        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn execute(&self, inputs: &Self::Inputs, _ctx: &StepContext) -> Result<Self::Outputs, StepError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Ok(TextOut { text: String::new() })
            } else {
                Ok(TextOut { text: inputs.text.clone() })
            }
        }

        fn validate_outputs(&self, outputs: &Self::Outputs) -> Result<(), String> {
            super::super::validate::non_empty(&outputs.text, "text")
        }
    }

    fn context() -> StepContext {
        let config = Config::for_tests();
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(LlmGateway::new(MockProvider::new(), store.clone(), &config));
        StepContext::new(gateway, store, FlowRunId::new(), None, CancellationToken::new())
    }

    #[tokio::test]
    async fn successful_step_persists_a_completed_row() {
        let ctx = context();
        let out = StepRuntime::run(&UppercaseStep, TextIn { text: "hi".into() }, 1, &ctx).await.unwrap();
        assert_eq!(out.text, "HI");

        let rows = ctx.store.list_flow_step_runs(ctx.flow_run_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, crate::domain::flow_step_run::FlowStepRunStatus::Completed);
    }

    #[tokio::test]
    async fn invalid_input_fails_without_running_execute() {
        let ctx = context();
        let err = StepRuntime::run(&UppercaseStep, TextIn { text: "   ".into() }, 1, &ctx).await.unwrap_err();
        assert!(matches!(err, StepError::Validation(_)));

        let rows = ctx.store.list_flow_step_runs(ctx.flow_run_id).await.unwrap();
        assert_eq!(rows[0].status, crate::domain::flow_step_run::FlowStepRunStatus::Failed);
    }

    #[tokio::test]
    async fn output_validation_failure_is_repaired_once() {
        let ctx = context();
        let step = FlakyStep { calls: AtomicUsize::new(0) };
        let out = StepRuntime::run(&step, TextIn { text: "hello".into() }, 1, &ctx).await.unwrap();
        assert_eq!(out.text, "hello");
        assert_eq!(step.calls.load(Ordering::SeqCst), 2);
    }

    struct LlmCallingStep;

    #[async_trait]
    impl Step for LlmCallingStep {
        type Inputs = TextIn;
        type Outputs = TextOut;

        fn name(&self) -> &'static str {
            "llm_calling"
        }

        async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError> {
            let (value, request_id, usage) = ctx
                .llm
                .generate_structured::<TextOut>(
                    vec![crate::domain::LlmMessageRecord::text("user", inputs.text.clone())],
                    "TextOut",
                    crate::llm::LlmCallOptions::default(),
                )
                .await?;
            ctx.record_llm_usage(request_id, usage.tokens_used, usage.cost_estimate);
            Ok(value)
        }
    }

    #[tokio::test]
    async fn llm_usage_is_folded_into_the_persisted_step_row() {
        let config = Config::for_tests();
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let provider = MockProvider::new();
        provider.push_completion(r#"{"text":"hi"}"#);
        let gateway = Arc::new(LlmGateway::new(provider, store.clone(), &config));
        let ctx = StepContext::new(gateway, store, FlowRunId::new(), None, CancellationToken::new());

        StepRuntime::run(&LlmCallingStep, TextIn { text: "greet".into() }, 1, &ctx).await.unwrap();

        let rows = ctx.store.list_flow_step_runs(ctx.flow_run_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].tokens_used > 0);
        assert!(rows[0].llm_request_id.is_some());
    }

    #[tokio::test]
    async fn successful_step_advances_flow_run_progress() {
        let ctx = context();
        let mut run = crate::domain::FlowRun::new("test_flow", crate::domain::ExecutionMode::Sync, serde_json::json!({}), 2);
        run.id = ctx.flow_run_id;
        ctx.store.insert_flow_run(&run).await.unwrap();

        StepRuntime::run(&UppercaseStep, TextIn { text: "hi".into() }, 1, &ctx).await.unwrap();

        let reloaded = ctx.store.get_flow_run(ctx.flow_run_id).await.unwrap();
        assert_eq!(reloaded.step_progress, 1);
        assert_eq!(reloaded.current_step.as_deref(), Some("uppercase"));
    }
}
