//! Structured shapes the LLM gateway is instructed to emit for each step.
//! These mirror the domain types in [`crate::domain`] closely but stay
//! separate from them: a step's schema is the provider-facing contract,
//! the domain type is what gets persisted, and [`super::assemble`]
//! converts one into the other.

use serde::{Deserialize, Serialize};

use crate::domain::lesson::{Confusable, GlossaryTerm, McqAnswerKey, McqOption, Misconception, WrongAnswer};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LearningObjectiveSchema {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub bloom_level: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LessonPlanEntry {
    pub title: String,
    pub lesson_objective: String,
    pub learning_objective_ids: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitMetadataSchema {
    pub unit_title: String,
    pub learning_objectives: Vec<LearningObjectiveSchema>,
    pub lessons: Vec<LessonPlanEntry>,
    pub lesson_count: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceMaterialSchema {
    pub source_material: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitSummarySchema {
    pub summary: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LessonMetadataSchema {
    pub objectives: Vec<String>,
    pub refined_material: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MisconceptionBankSchema {
    pub misconceptions: Vec<Misconception>,
    pub confusables: Vec<Confusable>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DidacticSnippetSchema {
    pub mini_lesson: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlossarySchema {
    pub terms: Vec<GlossaryTerm>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct McqSchema {
    pub id: String,
    pub lo_id: String,
    pub stem: String,
    pub options: Vec<McqOption>,
    pub answer_key: McqAnswerKey,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct McqBankSchema {
    pub mcqs: Vec<McqSchema>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShortAnswerSchema {
    pub id: String,
    pub lo_id: String,
    pub stem: String,
    pub canonical_answer: String,
    pub acceptable_answers: Vec<String>,
    pub wrong_answers: Vec<WrongAnswer>,
    pub explanation_correct: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShortAnswerBankSchema {
    pub short_answers: Vec<ShortAnswerSchema>,
}

/// Per-LO pool of plausible wrong answers the fast path hands to
/// `GenerateMCQs` so it doesn't have to invent distractors from scratch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DistractorPoolEntry {
    pub lo_id: String,
    pub distractors: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FastLessonMetadataSchema {
    pub objectives: Vec<String>,
    pub refined_material: String,
    pub misconceptions: Vec<Misconception>,
    pub confusables: Vec<Confusable>,
    pub length_budgets: super::length_budgets::LengthBudgets,
    pub mini_lesson: String,
    pub glossary: Vec<GlossaryTerm>,
    pub distractor_pool: Vec<DistractorPoolEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitArtDescriptionSchema {
    pub prompt: String,
    pub alt_text: String,
    pub palette: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PodcastTranscriptSchema {
    pub transcript: String,
}
