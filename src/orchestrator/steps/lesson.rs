//! Lesson-level steps, both the standard discrete pipeline and the fast
//! combined-call variant (`spec.md` §4.4.2).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::LlmMessageRecord;
use crate::llm::LlmCallOptions;
use crate::steps::{validate, Step, StepContext, StepError};

use crate::orchestrator::length_budgets::LengthBudgets;
use crate::orchestrator::schemas::{
    DistractorPoolEntry, FastLessonMetadataSchema, GlossarySchema, LessonMetadataSchema, McqBankSchema,
    MisconceptionBankSchema, ShortAnswerBankSchema,
};

fn lo_context(lesson_objective: &str, learning_objective_ids: &[String]) -> String {
    format!("Lesson objective: {lesson_objective}\nCovers learning objective ids: {}", learning_objective_ids.join(", "))
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ExtractLessonMetadataInputs {
    pub unit_source_material: String,
    pub lesson_title: String,
    pub lesson_objective: String,
    pub learning_objective_ids: Vec<String>,
}

pub struct ExtractLessonMetadata;

#[async_trait]
impl Step for ExtractLessonMetadata {
    type Inputs = ExtractLessonMetadataInputs;
    type Outputs = LessonMetadataSchema;

    fn name(&self) -> &'static str {
        "extract_lesson_metadata"
    }

    fn validate_inputs(&self, inputs: &Self::Inputs) -> Result<(), String> {
        validate::non_empty(&inputs.lesson_title, "lesson_title")
    }

    fn validate_outputs(&self, outputs: &Self::Outputs) -> Result<(), String> {
        validate::non_empty_slice(&outputs.objectives, "objectives")?;
        validate::non_empty(&outputs.refined_material, "refined_material")
    }

    async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError> {
        let prompt = format!(
            "Unit source material:\n{}\n\nLesson: {}\n{}\n\n\
             Extract the specific objectives this lesson should teach and the slice of the \
             unit material (refined, lesson-scoped) it should draw from.",
            inputs.unit_source_material,
            inputs.lesson_title,
            lo_context(&inputs.lesson_objective, &inputs.learning_objective_ids),
        );
        let (schema, request_id, usage) = ctx
            .llm
            .generate_structured::<LessonMetadataSchema>(
                vec![LlmMessageRecord::text("user", prompt)],
                "LessonMetadata",
                LlmCallOptions { user_id: ctx.user_id.clone(), cancellation: Some(ctx.cancellation.clone()), ..Default::default() },
            )
            .await?;
        ctx.record_llm_usage(request_id, usage.tokens_used, usage.cost_estimate);
        Ok(schema)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MisconceptionBankInputs {
    pub lesson_title: String,
    pub refined_material: String,
    pub learning_objective_ids: Vec<String>,
}

pub struct GenerateMisconceptionBank;

#[async_trait]
impl Step for GenerateMisconceptionBank {
    type Inputs = MisconceptionBankInputs;
    type Outputs = MisconceptionBankSchema;

    fn name(&self) -> &'static str {
        "generate_misconception_bank"
    }

    async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError> {
        let prompt = format!(
            "Lesson '{}'. Material:\n{}\n\nList common learner misconceptions (with why they're \
             wrong) and pairs of confusable terms/concepts (with the distinction), scoped to \
             learning objectives: {}.",
            inputs.lesson_title,
            inputs.refined_material,
            inputs.learning_objective_ids.join(", "),
        );
        let (schema, request_id, usage) = ctx
            .llm
            .generate_structured::<MisconceptionBankSchema>(
                vec![LlmMessageRecord::text("user", prompt)],
                "MisconceptionBank",
                LlmCallOptions { user_id: ctx.user_id.clone(), cancellation: Some(ctx.cancellation.clone()), ..Default::default() },
            )
            .await?;
        ctx.record_llm_usage(request_id, usage.tokens_used, usage.cost_estimate);
        Ok(schema)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DidacticSnippetInputs {
    pub lesson_title: String,
    pub refined_material: String,
    pub length_budget_words: u32,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DidacticSnippetOutputs {
    pub mini_lesson: String,
}

pub struct GenerateDidacticSnippet;

#[async_trait]
impl Step for GenerateDidacticSnippet {
    type Inputs = DidacticSnippetInputs;
    type Outputs = DidacticSnippetOutputs;

    fn name(&self) -> &'static str {
        "generate_didactic_snippet"
    }

    fn validate_outputs(&self, outputs: &Self::Outputs) -> Result<(), String> {
        validate::non_empty(&outputs.mini_lesson, "mini_lesson")
    }

    async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError> {
        let prompt = format!(
            "Write a mini-lesson (at most {} words) teaching '{}' from this material:\n{}",
            inputs.length_budget_words, inputs.lesson_title, inputs.refined_material,
        );
        let (schema, request_id, usage) = ctx
            .llm
            .generate_structured::<crate::orchestrator::schemas::DidacticSnippetSchema>(
                vec![LlmMessageRecord::text("user", prompt)],
                "DidacticSnippet",
                LlmCallOptions { user_id: ctx.user_id.clone(), cancellation: Some(ctx.cancellation.clone()), ..Default::default() },
            )
            .await?;
        ctx.record_llm_usage(request_id, usage.tokens_used, usage.cost_estimate);
        Ok(DidacticSnippetOutputs { mini_lesson: schema.mini_lesson })
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GlossaryInputs {
    pub lesson_title: String,
    pub refined_material: String,
    pub definition_word_budget: u32,
}

pub struct GenerateGlossary;

#[async_trait]
impl Step for GenerateGlossary {
    type Inputs = GlossaryInputs;
    type Outputs = GlossarySchema;

    fn name(&self) -> &'static str {
        "generate_glossary"
    }

    async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError> {
        let prompt = format!(
            "For the lesson '{}', extract key terms from this material and define each in at \
             most {} words:\n{}",
            inputs.lesson_title, inputs.definition_word_budget, inputs.refined_material,
        );
        let (schema, request_id, usage) = ctx
            .llm
            .generate_structured::<GlossarySchema>(
                vec![LlmMessageRecord::text("user", prompt)],
                "Glossary",
                LlmCallOptions { user_id: ctx.user_id.clone(), cancellation: Some(ctx.cancellation.clone()), ..Default::default() },
            )
            .await?;
        ctx.record_llm_usage(request_id, usage.tokens_used, usage.cost_estimate);
        Ok(schema)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct McqInputs {
    pub lesson_title: String,
    pub refined_material: String,
    pub learning_objective_ids: Vec<String>,
    pub stem_word_budget: u32,
    /// Present only on the fast path, where `FastLessonMetadata` already
    /// produced plausible distractors.
    pub distractor_pool: Option<Vec<DistractorPoolEntry>>,
}

pub struct GenerateMCQs;

#[async_trait]
impl Step for GenerateMCQs {
    type Inputs = McqInputs;
    type Outputs = McqBankSchema;

    fn name(&self) -> &'static str {
        "generate_mcqs"
    }

    fn validate_outputs(&self, outputs: &Self::Outputs) -> Result<(), String> {
        for mcq in &outputs.mcqs {
            validate::within_word_budget(&mcq.stem, 60, "mcq.stem")?;
            if !mcq.options.iter().any(|o| o.id == mcq.answer_key.option_id) {
                return Err(format!("mcq '{}' answer_key.option_id does not match any option", mcq.id));
            }
        }
        Ok(())
    }

    async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError> {
        let distractor_hint = inputs
            .distractor_pool
            .as_ref()
            .map(|pool| {
                pool.iter()
                    .map(|e| format!("{}: {}", e.lo_id, e.distractors.join("; ")))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        let prompt = format!(
            "Write multiple-choice questions for lesson '{}', one per learning objective id in \
             [{}], stem under {} words, 4 options each with exactly one correct answer.\n\
             Material:\n{}\nCandidate distractors (optional, reuse or improve on them):\n{}",
            inputs.lesson_title,
            inputs.learning_objective_ids.join(", "),
            inputs.stem_word_budget,
            inputs.refined_material,
            distractor_hint,
        );
        let (schema, request_id, usage) = ctx
            .llm
            .generate_structured::<McqBankSchema>(
                vec![LlmMessageRecord::text("user", prompt)],
                "McqBank",
                LlmCallOptions { user_id: ctx.user_id.clone(), cancellation: Some(ctx.cancellation.clone()), ..Default::default() },
            )
            .await?;
        ctx.record_llm_usage(request_id, usage.tokens_used, usage.cost_estimate);
        Ok(schema)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ShortAnswerInputs {
    pub lesson_title: String,
    pub refined_material: String,
    pub learning_objective_ids: Vec<String>,
}

pub struct GenerateShortAnswers;

#[async_trait]
impl Step for GenerateShortAnswers {
    type Inputs = ShortAnswerInputs;
    type Outputs = ShortAnswerBankSchema;

    fn name(&self) -> &'static str {
        "generate_short_answers"
    }

    async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError> {
        let prompt = format!(
            "Write short-answer questions for lesson '{}' covering learning objective ids [{}], \
             each with a canonical answer, acceptable variants, and a few wrong answers with \
             explanations of why they're wrong.\nMaterial:\n{}",
            inputs.lesson_title,
            inputs.learning_objective_ids.join(", "),
            inputs.refined_material,
        );
        let (schema, request_id, usage) = ctx
            .llm
            .generate_structured::<ShortAnswerBankSchema>(
                vec![LlmMessageRecord::text("user", prompt)],
                "ShortAnswerBank",
                LlmCallOptions { user_id: ctx.user_id.clone(), cancellation: Some(ctx.cancellation.clone()), ..Default::default() },
            )
            .await?;
        ctx.record_llm_usage(request_id, usage.tokens_used, usage.cost_estimate);
        Ok(schema)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct FastLessonMetadataInputs {
    pub unit_source_material: String,
    pub lesson_title: String,
    pub lesson_objective: String,
    pub learning_objective_ids: Vec<String>,
}

pub struct FastLessonMetadata {
    pub length_budgets: LengthBudgets,
}

#[async_trait]
impl Step for FastLessonMetadata {
    type Inputs = FastLessonMetadataInputs;
    type Outputs = FastLessonMetadataSchema;

    fn name(&self) -> &'static str {
        "fast_lesson_metadata"
    }

    fn validate_inputs(&self, inputs: &Self::Inputs) -> Result<(), String> {
        validate::non_empty(&inputs.lesson_title, "lesson_title")
    }

    fn validate_outputs(&self, outputs: &Self::Outputs) -> Result<(), String> {
        validate::non_empty(&outputs.mini_lesson, "mini_lesson")?;
        validate::non_empty(&outputs.refined_material, "refined_material")
    }

    async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError> {
        let prompt = format!(
            "Fast path. Unit source material:\n{}\n\nLesson: {}\n{}\n\n\
             In one response produce: the lesson's own objectives; a refined, lesson-scoped \
             slice of the material; common misconceptions and confusable term pairs; length \
             budgets (mini_lesson_words<={}, glossary_definition_words<={}, mcq_stem_words<={}); \
             a mini-lesson within that budget; a glossary; and a per-learning-objective pool of \
             plausible wrong-answer distractors for later MCQ generation.",
            inputs.unit_source_material,
            inputs.lesson_title,
            lo_context(&inputs.lesson_objective, &inputs.learning_objective_ids),
            self.length_budgets.mini_lesson_words,
            self.length_budgets.glossary_definition_words,
            self.length_budgets.mcq_stem_words,
        );
        let (schema, request_id, usage) = ctx
            .llm
            .generate_structured::<FastLessonMetadataSchema>(
                vec![LlmMessageRecord::text("user", prompt)],
                "FastLessonMetadata",
                LlmCallOptions { user_id: ctx.user_id.clone(), cancellation: Some(ctx.cancellation.clone()), ..Default::default() },
            )
            .await?;
        ctx.record_llm_usage(request_id, usage.tokens_used, usage.cost_estimate);
        Ok(schema)
    }
}
