//! Unit-level steps (`spec.md` §4.4.1, §4.4.4).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::LlmMessageRecord;
use crate::llm::LlmCallOptions;
use crate::steps::{validate, Step, StepContext, StepError};

use crate::orchestrator::schemas::{UnitArtDescriptionSchema, UnitMetadataSchema};

#[derive(Clone, Serialize, Deserialize)]
pub struct SourceMaterialInputs {
    pub learner_desires: String,
    pub coach_learning_objectives: Option<Vec<String>>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SourceMaterialOutputs {
    pub source_material: String,
}

pub struct GenerateSourceMaterial;

#[async_trait]
impl Step for GenerateSourceMaterial {
    type Inputs = SourceMaterialInputs;
    type Outputs = SourceMaterialOutputs;

    fn name(&self) -> &'static str {
        "generate_source_material"
    }

    fn validate_inputs(&self, inputs: &Self::Inputs) -> Result<(), String> {
        validate::non_empty(&inputs.learner_desires, "learner_desires")
    }

    fn validate_outputs(&self, outputs: &Self::Outputs) -> Result<(), String> {
        validate::non_empty(&outputs.source_material, "source_material")
    }

    async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError> {
        let objectives = inputs.coach_learning_objectives.clone().unwrap_or_default().join(", ");
        let prompt = format!(
            "Write a self-contained tutorial body a learner could study from, covering: {}.\n\
             Coach-supplied objectives to weave in (if any): {objectives}.",
            inputs.learner_desires
        );
        let (schema, request_id, usage) = ctx
            .llm
            .generate_structured::<crate::orchestrator::schemas::SourceMaterialSchema>(
                vec![LlmMessageRecord::text("user", prompt)],
                "SourceMaterial",
                LlmCallOptions { user_id: ctx.user_id.clone(), cancellation: Some(ctx.cancellation.clone()), ..Default::default() },
            )
            .await?;
        ctx.record_llm_usage(request_id, usage.tokens_used, usage.cost_estimate);
        Ok(SourceMaterialOutputs { source_material: schema.source_material })
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ExtractUnitMetadataInputs {
    pub learner_desires: String,
    pub source_material: String,
    pub target_lesson_count: u32,
    pub coach_learning_objectives: Option<Vec<String>>,
}

pub struct ExtractUnitMetadata;

#[async_trait]
impl Step for ExtractUnitMetadata {
    type Inputs = ExtractUnitMetadataInputs;
    type Outputs = UnitMetadataSchema;

    fn name(&self) -> &'static str {
        "extract_unit_metadata"
    }

    fn validate_inputs(&self, inputs: &Self::Inputs) -> Result<(), String> {
        validate::non_empty(&inputs.source_material, "source_material")
    }

    fn validate_outputs(&self, outputs: &Self::Outputs) -> Result<(), String> {
        validate::non_empty_slice(&outputs.learning_objectives, "learning_objectives")?;
        validate::non_empty_slice(&outputs.lessons, "lessons")?;
        for lesson in &outputs.lessons {
            for lo_id in &lesson.learning_objective_ids {
                if !outputs.learning_objectives.iter().any(|lo| &lo.id == lo_id) {
                    return Err(format!("lesson '{}' references unknown learning objective '{lo_id}'", lesson.title));
                }
            }
        }
        Ok(())
    }

    async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError> {
        let prompt = format!(
            "Source material:\n{}\n\nLearner desires: {}\nTarget lesson count: {}\n\
             Produce a unit title, a list of learning objectives each with a stable id \
             like 'lo_1', 'lo_2', and a lesson plan of exactly {} entries (fewer only if \
             clearly justified), each referencing the learning objective ids it covers.",
            inputs.source_material, inputs.learner_desires, inputs.target_lesson_count, inputs.target_lesson_count,
        );
        let (schema, request_id, usage) = ctx
            .llm
            .generate_structured::<UnitMetadataSchema>(
                vec![LlmMessageRecord::text("user", prompt)],
                "UnitMetadata",
                LlmCallOptions { user_id: ctx.user_id.clone(), cancellation: Some(ctx.cancellation.clone()), ..Default::default() },
            )
            .await?;
        ctx.record_llm_usage(request_id, usage.tokens_used, usage.cost_estimate);
        Ok(schema)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct UnitSummaryInputs {
    pub unit_title: String,
    pub source_material: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct UnitSummaryOutputs {
    pub summary: String,
}

pub struct GenerateUnitSummary;

#[async_trait]
impl Step for GenerateUnitSummary {
    type Inputs = UnitSummaryInputs;
    type Outputs = UnitSummaryOutputs;

    fn name(&self) -> &'static str {
        "generate_unit_summary"
    }

    fn validate_outputs(&self, outputs: &Self::Outputs) -> Result<(), String> {
        validate::non_empty(&outputs.summary, "summary")
    }

    async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError> {
        let prompt = format!(
            "Summarize the unit '{}' in 3-4 sentences suitable as a podcast lead-in.\n\nSource material:\n{}",
            inputs.unit_title, inputs.source_material
        );
        let (schema, request_id, usage) = ctx
            .llm
            .generate_structured::<crate::orchestrator::schemas::UnitSummarySchema>(
                vec![LlmMessageRecord::text("user", prompt)],
                "UnitSummary",
                LlmCallOptions { user_id: ctx.user_id.clone(), cancellation: Some(ctx.cancellation.clone()), ..Default::default() },
            )
            .await?;
        ctx.record_llm_usage(request_id, usage.tokens_used, usage.cost_estimate);
        Ok(UnitSummaryOutputs { summary: schema.summary })
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct UnitArtInputs {
    pub unit_title: String,
    pub summary: Option<String>,
}

pub struct GenerateUnitArtDescription;

#[async_trait]
impl Step for GenerateUnitArtDescription {
    type Inputs = UnitArtInputs;
    type Outputs = UnitArtDescriptionSchema;

    fn name(&self) -> &'static str {
        "generate_unit_art_description"
    }

    fn validate_outputs(&self, outputs: &Self::Outputs) -> Result<(), String> {
        validate::non_empty(&outputs.prompt, "prompt")?;
        validate::non_empty(&outputs.alt_text, "alt_text")
    }

    async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError> {
        let prompt = format!(
            "Describe cover art for a learning unit titled '{}'. {}\n\
             Produce an image-generation prompt, accessible alt text, and a short color palette.",
            inputs.unit_title,
            inputs.summary.as_deref().unwrap_or(""),
        );
        let (schema, request_id, usage) = ctx
            .llm
            .generate_structured::<UnitArtDescriptionSchema>(
                vec![LlmMessageRecord::text("user", prompt)],
                "UnitArtDescription",
                LlmCallOptions { user_id: ctx.user_id.clone(), cancellation: Some(ctx.cancellation.clone()), ..Default::default() },
            )
            .await?;
        ctx.record_llm_usage(request_id, usage.tokens_used, usage.cost_estimate);
        Ok(schema)
    }
}
