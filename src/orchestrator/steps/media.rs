//! Media-adjacent steps (`spec.md` §4.4.4). The media *calls themselves*
//! (`generate_image`, `generate_audio`) are gateway operations, not steps;
//! only the transcript-writing step runs through the step runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::LlmMessageRecord;
use crate::llm::LlmCallOptions;
use crate::steps::{validate, Step, StepContext, StepError};

use crate::orchestrator::schemas::PodcastTranscriptSchema;

#[derive(Clone, Serialize, Deserialize)]
pub struct PodcastTranscriptInputs {
    pub title: String,
    pub material: String,
}

pub struct GeneratePodcastTranscript;

#[async_trait]
impl Step for GeneratePodcastTranscript {
    type Inputs = PodcastTranscriptInputs;
    type Outputs = PodcastTranscriptSchema;

    fn name(&self) -> &'static str {
        "generate_podcast_transcript"
    }

    fn validate_inputs(&self, inputs: &Self::Inputs) -> Result<(), String> {
        validate::non_empty(&inputs.material, "material")
    }

    fn validate_outputs(&self, outputs: &Self::Outputs) -> Result<(), String> {
        validate::non_empty(&outputs.transcript, "transcript")
    }

    async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError> {
        let prompt = format!(
            "Write a two-minute single-narrator podcast transcript introducing '{}', based on:\n{}",
            inputs.title, inputs.material,
        );
        let (schema, request_id, usage) = ctx
            .llm
            .generate_structured::<PodcastTranscriptSchema>(
                vec![LlmMessageRecord::text("user", prompt)],
                "PodcastTranscript",
                LlmCallOptions { user_id: ctx.user_id.clone(), cancellation: Some(ctx.cancellation.clone()), ..Default::default() },
            )
            .await?;
        ctx.record_llm_usage(request_id, usage.tokens_used, usage.cost_estimate);
        Ok(schema)
    }
}
