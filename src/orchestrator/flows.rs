//! The business flows that turn a unit creation request into a persisted
//! [`Unit`] with its [`Lesson`]s (`spec.md` §4.4). `UnitOrchestrator::create_unit`
//! is `assemble_unit` (`spec.md` §4.4.5) run end to end.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Classify, ErrorKind};
use crate::domain::{
    ExecutionMode, Lesson, LearnerLevel, LearningObjective, Unit, UnitFlowType, UnitStatus,
};
use crate::flows::{fan_out, FlowError, FlowRuntime};
use crate::ids::{FlowRunId, LessonId, UnitId};
use crate::llm::{LlmGateway, LlmCallOptions};
use crate::objectstore::ObjectStore;
use crate::steps::{StepContext, StepError, StepRuntime};
use crate::store::Store;

use super::assemble::{LessonArtifacts, PackageAssembler};
use super::error::OrchestratorError;
use super::length_budgets::LengthBudgets;
use super::schemas::{DistractorPoolEntry, LessonPlanEntry};
use super::steps::lesson::{
    DidacticSnippetInputs, ExtractLessonMetadata, ExtractLessonMetadataInputs, FastLessonMetadata,
    FastLessonMetadataInputs, GenerateDidacticSnippet, GenerateGlossary, GenerateMCQs, GenerateMisconceptionBank,
    GenerateShortAnswers, GlossaryInputs, McqInputs, MisconceptionBankInputs, ShortAnswerInputs,
};
use super::steps::media::{GeneratePodcastTranscript, PodcastTranscriptInputs};
use super::steps::unit::{
    ExtractUnitMetadata, ExtractUnitMetadataInputs, GenerateSourceMaterial, GenerateUnitArtDescription,
    GenerateUnitSummary, SourceMaterialInputs, UnitArtInputs, UnitSummaryInputs,
};

/// Request body of `UnitCreationFlow` (`spec.md` §4.4.1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitCreationRequest {
    pub learner_desires: String,
    pub coach_learning_objectives: Option<Vec<String>>,
    pub source_material: Option<String>,
    pub target_lesson_count: u32,
    pub learner_level: LearnerLevel,
    pub flow_type: UnitFlowType,
    pub user_id: Option<String>,
}

/// What `run_unit_creation_flow` hands back to `create_unit`: the unit plan
/// plus the (generated or supplied) source material downstream lesson steps
/// draw from (`spec.md` §4.4.1 output).
#[derive(Clone, Serialize, Deserialize)]
struct UnitPlan {
    unit_title: String,
    learning_objectives: Vec<LearningObjective>,
    lessons: Vec<LessonPlanEntry>,
    source_material: String,
    summary: Option<String>,
}

/// One lesson plan entry carried through fan-out, with the lesson id
/// pre-allocated so the package and the persisted row agree on it.
#[derive(Clone)]
struct LessonPlanJob {
    index: usize,
    lesson_id: LessonId,
    title: String,
    lesson_objective: String,
    learning_objective_ids: Vec<String>,
}

pub struct UnitOrchestrator {
    llm: Arc<LlmGateway>,
    store: Arc<dyn Store>,
    object_store: Arc<dyn ObjectStore>,
    lesson_parallelism: usize,
    heartbeat_interval: Duration,
}

impl UnitOrchestrator {
    #[must_use]
    pub fn new(
        llm: Arc<LlmGateway>,
        store: Arc<dyn Store>,
        object_store: Arc<dyn ObjectStore>,
        lesson_parallelism: usize,
        heartbeat_interval: Duration,
    ) -> Self {
        Self { llm, store, object_store, lesson_parallelism, heartbeat_interval }
    }

    /// `assemble_unit` (`spec.md` §4.4.5), run to a terminal `Unit` status.
    /// Returns `Err` only when the unit row itself could not be persisted;
    /// every other failure (plan flow failure, zero lessons) is recorded on
    /// the `Unit` row and `Ok(unit_id)` is returned, since job submitters
    /// read outcome off the row, not off this call's `Result`.
    pub async fn create_unit(
        &self,
        request: UnitCreationRequest,
        execution_mode: ExecutionMode,
        cancellation: CancellationToken,
    ) -> Result<UnitId, OrchestratorError> {
        let unit = self.allocate_pending_unit(&request).await?;
        self.run_unit_creation(unit, request, execution_mode, cancellation).await
    }

    /// Steps 1-2 of `assemble_unit`: writes the `pending`-then-`in_progress`
    /// `Unit` row and returns it. Split out from [`Self::create_unit`] so a
    /// job submitter can hand back `unit_id` before the (potentially long)
    /// remainder of the flow runs in the background (`spec.md` §4.5).
    pub async fn allocate_pending_unit(&self, request: &UnitCreationRequest) -> Result<Unit, OrchestratorError> {
        let mut unit = Unit::new(String::new(), request.learner_level, request.target_lesson_count, request.flow_type);
        unit.owner_user_id = request.user_id.clone();
        unit.generated_from_topic = request.source_material.is_none();
        self.store.upsert_unit(&unit).await?;

        unit.status = UnitStatus::InProgress;
        unit.creation_progress = Some(serde_json::json!({ "phase": "unit_plan" }));
        self.store.upsert_unit(&unit).await?;
        Ok(unit)
    }

    /// Steps 3-7 of `assemble_unit`, given an already-allocated `Unit` row.
    pub async fn run_unit_creation(
        &self,
        mut unit: Unit,
        request: UnitCreationRequest,
        execution_mode: ExecutionMode,
        cancellation: CancellationToken,
    ) -> Result<UnitId, OrchestratorError> {
        // 3. Run UnitCreationFlow.
        let (plan_run_id, plan_result) = self
            .run_unit_creation_flow(&request, execution_mode, cancellation.clone())
            .await;
        unit.originating_flow_run_id = Some(plan_run_id);

        let plan = match plan_result {
            Ok(plan) => plan,
            Err(error) => {
                unit.status = UnitStatus::Failed;
                unit.error_message = Some(error.to_string());
                self.store.upsert_unit(&unit).await?;
                return Ok(unit.id);
            }
        };

        // 4. Update unit metadata.
        unit.title = plan.unit_title.clone();
        unit.description = plan.summary.clone();
        unit.learning_objectives = plan.learning_objectives.clone();
        unit.source_material = Some(plan.source_material.clone());
        unit.creation_progress = Some(serde_json::json!({ "phase": "lessons" }));
        self.store.upsert_unit(&unit).await?;

        // 5. Fan out lesson creation under the concurrency cap, in plan order.
        let jobs: Vec<LessonPlanJob> = plan
            .lessons
            .iter()
            .enumerate()
            .map(|(index, entry)| LessonPlanJob {
                index,
                lesson_id: LessonId::new(),
                title: entry.title.clone(),
                lesson_objective: entry.lesson_objective.clone(),
                learning_objective_ids: entry.learning_objective_ids.clone(),
            })
            .collect();

        let llm = self.llm.clone();
        let store = self.store.clone();
        let unit_id = unit.id;
        let unit_source_material = plan.source_material.clone();
        let learner_level = request.learner_level;
        let flow_type = request.flow_type;
        let user_id = request.user_id.clone();
        let heartbeat_interval = self.heartbeat_interval;

        let results = fan_out(jobs, self.lesson_parallelism, move |_idx, job| {
            let llm = llm.clone();
            let store = store.clone();
            let unit_source_material = unit_source_material.clone();
            let user_id = user_id.clone();
            let cancellation = cancellation.clone();
            async move {
                let (child_run_id, outcome) = run_lesson_creation_flow(
                    llm,
                    store,
                    unit_id,
                    unit_source_material,
                    learner_level,
                    flow_type,
                    job.clone(),
                    user_id,
                    heartbeat_interval,
                    cancellation,
                )
                .await;
                (job, child_run_id, outcome)
            }
        })
        .await;

        let mut lesson_errors = Vec::new();
        let mut error_kinds: Vec<ErrorKind> = Vec::new();
        for (job, child_run_id, outcome) in results {
            FlowRuntime::record_child_flow_run(self.store.as_ref(), plan_run_id, child_run_id).await.ok();
            match outcome {
                Ok(mut lesson) => {
                    self.store.upsert_lesson(&lesson).await?;
                    self.run_lesson_podcast_flow(&mut lesson).await;
                    unit.lesson_order.push(lesson.id);
                }
                Err(error) => {
                    let message = error.to_string();
                    error_kinds.push(error.classify());
                    FlowRuntime::record_lesson_error(self.store.as_ref(), plan_run_id, job.index, &job.title, &message)
                        .await
                        .ok();
                    lesson_errors.push(serde_json::json!({ "index": job.index, "title": job.title, "error": message }));
                }
            }
        }
        unit.creation_progress = Some(serde_json::json!({ "phase": "media", "lesson_errors": lesson_errors }));
        self.store.upsert_unit(&unit).await?;

        // 6. Media flows, best-effort.
        if !unit.lesson_order.is_empty() {
            self.run_unit_art_flow(&mut unit).await;
            self.run_unit_podcast_flow(&mut unit, plan.summary.as_deref().unwrap_or(&plan.source_material)).await;
        }

        // 7. Decide terminal state.
        if unit.lesson_order.is_empty() {
            unit.status = UnitStatus::Failed;
            unit.error_message = Some(match most_common_error_kind(&error_kinds) {
                Some(kind) => format!("unit creation produced zero lessons: most common lesson failure was {kind}"),
                None => OrchestratorError::NoLessonsProduced.to_string(),
            });
        } else {
            unit.status = UnitStatus::Completed;
        }
        unit.creation_progress = Some(serde_json::json!({ "phase": "done", "lesson_errors": lesson_errors }));
        self.store.upsert_unit(&unit).await?;

        Ok(unit.id)
    }

    async fn run_unit_creation_flow(
        &self,
        request: &UnitCreationRequest,
        execution_mode: ExecutionMode,
        cancellation: CancellationToken,
    ) -> (FlowRunId, Result<UnitPlan, OrchestratorError>) {
        let llm = self.llm.clone();
        let store = self.store.clone();
        let request = request.clone();
        let heartbeat_interval = self.heartbeat_interval;
        let user_id = request.user_id.clone();

        let inputs_json = serde_json::json!({
            "learner_desires": request.learner_desires,
            "target_lesson_count": request.target_lesson_count,
        });

        let (run_id, result) = FlowRuntime::execute(
            store.clone(),
            "unit_creation",
            execution_mode,
            user_id,
            inputs_json,
            3,
            heartbeat_interval,
            cancellation.clone(),
            move |run_id| {
                let llm = llm.clone();
                let store = store.clone();
                let request = request.clone();
                let cancellation = cancellation.clone();
                async move {
                    let ctx = StepContext::new(llm, store, run_id, request.user_id.clone(), cancellation);

                    let source_material = if let Some(material) = request.source_material.clone() {
                        material
                    } else {
                        StepRuntime::run(
                            &GenerateSourceMaterial,
                            SourceMaterialInputs {
                                learner_desires: request.learner_desires.clone(),
                                coach_learning_objectives: request.coach_learning_objectives.clone(),
                            },
                            1,
                            &ctx,
                        )
                        .await?
                        .source_material
                    };

                    let metadata = StepRuntime::run(
                        &ExtractUnitMetadata,
                        ExtractUnitMetadataInputs {
                            learner_desires: request.learner_desires.clone(),
                            source_material: source_material.clone(),
                            target_lesson_count: request.target_lesson_count,
                            coach_learning_objectives: request.coach_learning_objectives.clone(),
                        },
                        2,
                        &ctx,
                    )
                    .await?;

                    let summary = StepRuntime::run(
                        &GenerateUnitSummary,
                        UnitSummaryInputs { unit_title: metadata.unit_title.clone(), source_material: source_material.clone() },
                        3,
                        &ctx,
                    )
                    .await
                    .ok()
                    .map(|o| o.summary);

                    let learning_objectives = metadata
                        .learning_objectives
                        .into_iter()
                        .map(|lo| LearningObjective { id: lo.id, title: lo.title, description: lo.description })
                        .collect();

                    let plan = UnitPlan {
                        unit_title: metadata.unit_title,
                        learning_objectives,
                        lessons: metadata.lessons,
                        source_material,
                        summary,
                    };
                    Ok(serde_json::to_value(&plan).unwrap_or(serde_json::Value::Null))
                }
            },
        )
        .await;

        let result = result.map_err(OrchestratorError::from).and_then(|value| {
            serde_json::from_value::<UnitPlan>(value)
                .map_err(|e| OrchestratorError::Step(StepError::InvalidResponse(e.to_string())))
        });
        (run_id, result)
    }

    /// `UnitArtCreationFlow` (`spec.md` §4.4.4): best-effort, recorded on the
    /// unit but never fails it.
    async fn run_unit_art_flow(&self, unit: &mut Unit) {
        let ctx = StepContext::new(
            self.llm.clone(),
            self.store.clone(),
            FlowRunId::new(),
            unit.owner_user_id.clone(),
            CancellationToken::new(),
        );
        let description = match StepRuntime::run(
            &GenerateUnitArtDescription,
            UnitArtInputs { unit_title: unit.title.clone(), summary: unit.description.clone() },
            1,
            &ctx,
        )
        .await
        {
            Ok(d) => d,
            Err(error) => {
                tracing::warn!(unit_id = %unit.id, %error, "unit art description failed, skipping cover art");
                return;
            }
        };

        let image = match self.llm.generate_image(&description.prompt, "1024x1024", None, None).await {
            Ok((image, _request_id)) => image,
            Err(error) => {
                tracing::warn!(unit_id = %unit.id, %error, "image generation failed, skipping cover art");
                return;
            }
        };

        let (bytes, content_type) = image_payload_bytes(&image.payload);
        let key = format!("units/{}/art.png", unit.id);
        match self.object_store.put(&key, &bytes, content_type).await {
            Ok(_stored) => unit.art_image_id = Some(crate::ids::ImageAssetId::new()),
            Err(error) => tracing::warn!(unit_id = %unit.id, %error, "object store put failed, skipping cover art"),
        }
        self.store.upsert_unit(unit).await.ok();
    }

    /// `UnitPodcastFlow` (`spec.md` §4.4.4): best-effort.
    async fn run_unit_podcast_flow(&self, unit: &mut Unit, material: &str) {
        let ctx = StepContext::new(
            self.llm.clone(),
            self.store.clone(),
            FlowRunId::new(),
            unit.owner_user_id.clone(),
            CancellationToken::new(),
        );
        let transcript = match StepRuntime::run(
            &GeneratePodcastTranscript,
            PodcastTranscriptInputs { title: unit.title.clone(), material: material.to_string() },
            1,
            &ctx,
        )
        .await
        {
            Ok(t) => t,
            Err(error) => {
                tracing::warn!(unit_id = %unit.id, %error, "podcast transcript failed, skipping podcast");
                return;
            }
        };

        let audio = match self
            .llm
            .generate_audio(&transcript.transcript, "narrator", LlmCallOptions { user_id: unit.owner_user_id.clone(), ..Default::default() })
            .await
        {
            Ok((audio, _request_id)) => audio,
            Err(error) => {
                tracing::warn!(unit_id = %unit.id, %error, "audio generation failed, skipping podcast");
                return;
            }
        };

        let key = format!("units/{}/podcast.mp3", unit.id);
        match self.object_store.put(&key, &audio.bytes, "audio/mpeg").await {
            Ok(_stored) => {
                unit.podcast_audio_id = Some(crate::ids::AudioAssetId::new());
                unit.podcast_transcript = Some(transcript.transcript);
            }
            Err(error) => tracing::warn!(unit_id = %unit.id, %error, "object store put failed, skipping podcast"),
        }
        self.store.upsert_unit(unit).await.ok();
    }

    /// `LessonPodcastFlow` (`spec.md` §4.4.4): the per-lesson counterpart of
    /// `run_unit_podcast_flow` — best-effort, never fails the owning lesson.
    async fn run_lesson_podcast_flow(&self, lesson: &mut Lesson) {
        let Some(package) = lesson.package.as_ref() else {
            return;
        };
        let material = package.mini_lesson.clone();

        let ctx = StepContext::new(self.llm.clone(), self.store.clone(), FlowRunId::new(), None, CancellationToken::new());
        let transcript =
            match StepRuntime::run(&GeneratePodcastTranscript, PodcastTranscriptInputs { title: lesson.title.clone(), material }, 1, &ctx).await {
                Ok(t) => t,
                Err(error) => {
                    tracing::warn!(lesson_id = %lesson.id, %error, "lesson podcast transcript failed, skipping podcast");
                    return;
                }
            };

        let audio = match self.llm.generate_audio(&transcript.transcript, "narrator", LlmCallOptions::default()).await {
            Ok((audio, _request_id)) => audio,
            Err(error) => {
                tracing::warn!(lesson_id = %lesson.id, %error, "lesson audio generation failed, skipping podcast");
                return;
            }
        };

        let key = format!("lessons/{}/podcast.mp3", lesson.id);
        match self.object_store.put(&key, &audio.bytes, "audio/mpeg").await {
            Ok(_stored) => {
                lesson.podcast_audio_id = Some(crate::ids::AudioAssetId::new());
                lesson.podcast_transcript = Some(transcript.transcript);
                lesson.podcast_duration_seconds = Some(audio.duration_seconds);
            }
            Err(error) => tracing::warn!(lesson_id = %lesson.id, %error, "object store put failed, skipping lesson podcast"),
        }
        self.store.upsert_lesson(lesson).await.ok();
    }
}

fn most_common_error_kind(kinds: &[ErrorKind]) -> Option<ErrorKind> {
    let mut counts: Vec<(ErrorKind, usize)> = Vec::new();
    for kind in kinds {
        match counts.iter_mut().find(|(k, _)| k == kind) {
            Some((_, count)) => *count += 1,
            None => counts.push((*kind, 1)),
        }
    }
    counts.into_iter().max_by_key(|(_, count)| *count).map(|(kind, _)| kind)
}

fn image_payload_bytes(payload: &crate::llm::ImagePayload) -> (Vec<u8>, &'static str) {
    match payload {
        crate::llm::ImagePayload::Bytes(bytes) => (bytes.clone(), "image/png"),
        crate::llm::ImagePayload::Url(url) => (url.clone().into_bytes(), "text/uri-list"),
    }
}

/// `LessonCreationFlow` for one plan entry, run as a child `FlowRun` of the
/// parent unit-creation flow (`spec.md` §4.3 fan-out: "each sub-execution is
/// itself a first-class FlowRun").
#[allow(clippy::too_many_arguments)]
async fn run_lesson_creation_flow(
    llm: Arc<LlmGateway>,
    store: Arc<dyn Store>,
    unit_id: UnitId,
    unit_source_material: String,
    learner_level: LearnerLevel,
    flow_type: UnitFlowType,
    job: LessonPlanJob,
    user_id: Option<String>,
    heartbeat_interval: Duration,
    cancellation: CancellationToken,
) -> (FlowRunId, Result<Lesson, OrchestratorError>) {
    let flow_name = match flow_type {
        UnitFlowType::Standard => "lesson_creation_standard",
        UnitFlowType::Fast => "lesson_creation_fast",
    };
    let total_steps = match flow_type {
        UnitFlowType::Standard => 6,
        UnitFlowType::Fast => 2,
    };
    let inputs_json = serde_json::json!({ "title": job.title, "lesson_objective": job.lesson_objective });

    let title = job.title.clone();
    let unit_source_material_for_body = unit_source_material.clone();

    let (run_id, result) = FlowRuntime::execute(
        store.clone(),
        flow_name,
        ExecutionMode::Sync,
        user_id.clone(),
        inputs_json,
        total_steps,
        heartbeat_interval,
        cancellation.clone(),
        move |run_id| {
            let llm = llm.clone();
            let store = store.clone();
            let job = job.clone();
            let user_id = user_id.clone();
            let cancellation = cancellation.clone();
            let unit_source_material = unit_source_material_for_body.clone();
            async move {
                let ctx = StepContext::new(llm, store, run_id, user_id, cancellation);
                let package = match flow_type {
                    UnitFlowType::Standard => run_standard_lesson(&ctx, &unit_source_material, &job, learner_level).await?,
                    UnitFlowType::Fast => run_fast_lesson(&ctx, &unit_source_material, &job, learner_level).await?,
                };
                Ok(serde_json::to_value(&package).unwrap_or(serde_json::Value::Null))
            }
        },
    )
    .await;

    let result = result
        .map_err(OrchestratorError::from)
        .and_then(|value| {
            serde_json::from_value(value).map_err(|e| OrchestratorError::Step(StepError::InvalidResponse(e.to_string())))
        })
        .map(|package| {
            let mut lesson = Lesson::new(unit_id, title, learner_level);
            lesson.source_material = Some(unit_source_material);
            lesson.flow_run_id = Some(run_id);
            lesson.set_package(package);
            lesson
        });

    (run_id, result)
}

async fn run_standard_lesson(
    ctx: &StepContext,
    unit_source_material: &str,
    job: &LessonPlanJob,
    learner_level: LearnerLevel,
) -> Result<crate::domain::LessonPackage, StepError> {
    let metadata = StepRuntime::run(
        &ExtractLessonMetadata,
        ExtractLessonMetadataInputs {
            unit_source_material: unit_source_material.to_string(),
            lesson_title: job.title.clone(),
            lesson_objective: job.lesson_objective.clone(),
            learning_objective_ids: job.learning_objective_ids.clone(),
        },
        1,
        ctx,
    )
    .await?;

    let bank = StepRuntime::run(
        &GenerateMisconceptionBank,
        MisconceptionBankInputs {
            lesson_title: job.title.clone(),
            refined_material: metadata.refined_material.clone(),
            learning_objective_ids: job.learning_objective_ids.clone(),
        },
        2,
        ctx,
    )
    .await?;

    let budgets = LengthBudgets::default();

    let snippet = StepRuntime::run(
        &GenerateDidacticSnippet,
        DidacticSnippetInputs {
            lesson_title: job.title.clone(),
            refined_material: metadata.refined_material.clone(),
            length_budget_words: budgets.mini_lesson_words,
        },
        3,
        ctx,
    )
    .await?;

    let glossary = StepRuntime::run(
        &GenerateGlossary,
        GlossaryInputs {
            lesson_title: job.title.clone(),
            refined_material: metadata.refined_material.clone(),
            definition_word_budget: budgets.glossary_definition_words,
        },
        4,
        ctx,
    )
    .await?;

    let mcqs = StepRuntime::run(
        &GenerateMCQs,
        McqInputs {
            lesson_title: job.title.clone(),
            refined_material: metadata.refined_material.clone(),
            learning_objective_ids: job.learning_objective_ids.clone(),
            stem_word_budget: budgets.mcq_stem_words,
            distractor_pool: None,
        },
        5,
        ctx,
    )
    .await?;

    let short_answers = StepRuntime::run(
        &GenerateShortAnswers,
        ShortAnswerInputs {
            lesson_title: job.title.clone(),
            refined_material: metadata.refined_material.clone(),
            learning_objective_ids: job.learning_objective_ids.clone(),
        },
        6,
        ctx,
    )
    .await?;

    let artifacts = LessonArtifacts {
        objectives: metadata.objectives,
        misconceptions: bank.misconceptions,
        confusables: bank.confusables,
        mini_lesson: snippet.mini_lesson,
        glossary_terms: glossary.terms,
        mcqs: mcqs.mcqs,
        short_answers: short_answers.short_answers,
    };

    PackageAssembler::assemble(job.lesson_id, job.title.clone(), learner_level, job.learning_objective_ids.clone(), artifacts)
        .map_err(|e| StepError::InvalidResponse(e.to_string()))
}

async fn run_fast_lesson(
    ctx: &StepContext,
    unit_source_material: &str,
    job: &LessonPlanJob,
    learner_level: LearnerLevel,
) -> Result<crate::domain::LessonPackage, StepError> {
    let fast = StepRuntime::run(
        &FastLessonMetadata { length_budgets: LengthBudgets::default() },
        FastLessonMetadataInputs {
            unit_source_material: unit_source_material.to_string(),
            lesson_title: job.title.clone(),
            lesson_objective: job.lesson_objective.clone(),
            learning_objective_ids: job.learning_objective_ids.clone(),
        },
        1,
        ctx,
    )
    .await?;

    let distractor_pool: Vec<DistractorPoolEntry> = fast.distractor_pool.clone();

    let mcqs = StepRuntime::run(
        &GenerateMCQs,
        McqInputs {
            lesson_title: job.title.clone(),
            refined_material: fast.refined_material.clone(),
            learning_objective_ids: job.learning_objective_ids.clone(),
            stem_word_budget: fast.length_budgets.mcq_stem_words,
            distractor_pool: Some(distractor_pool),
        },
        2,
        ctx,
    )
    .await?;

    let artifacts = LessonArtifacts {
        objectives: fast.objectives,
        misconceptions: fast.misconceptions,
        confusables: fast.confusables,
        mini_lesson: fast.mini_lesson,
        glossary_terms: fast.glossary,
        mcqs: mcqs.mcqs,
        short_answers: vec![],
    };

    PackageAssembler::assemble(job.lesson_id, job.title.clone(), learner_level, job.learning_objective_ids.clone(), artifacts)
        .map_err(|e| StepError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::llm::MockProvider;
    use crate::objectstore::FsObjectStore;
    use crate::store::InMemoryStore;

    fn orchestrator() -> (UnitOrchestrator, Arc<MockProvider>) {
        let config = Config::for_tests();
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        let llm = Arc::new(LlmGateway::new(SharedProvider(provider.clone()), store.clone(), &config));
        let object_store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(
            std::env::temp_dir().join(format!("lessonforge-orchestrator-test-{}", uuid::Uuid::new_v4())),
            "test-bucket",
        ));
        let orchestrator = UnitOrchestrator::new(llm, store, object_store, config.lesson_parallelism, config.heartbeat_interval);
        (orchestrator, provider)
    }

    struct SharedProvider(Arc<MockProvider>);

    #[async_trait::async_trait]
    impl crate::llm::LlmProvider for SharedProvider {
        fn name(&self) -> &'static str {
            self.0.name()
        }
        async fn complete(&self, request: &crate::llm::ProviderRequest) -> Result<crate::llm::ProviderCompletion, crate::llm::LlmError> {
            self.0.complete(request).await
        }
        async fn generate_audio(
            &self,
            text: &str,
            voice: &str,
            model: &str,
            audio_format: &str,
            speed: f32,
        ) -> Result<crate::llm::ProviderAudio, crate::llm::LlmError> {
            self.0.generate_audio(text, voice, model, audio_format, speed).await
        }
        async fn generate_image(
            &self,
            prompt: &str,
            size: &str,
            quality: Option<&str>,
            style: Option<&str>,
        ) -> Result<crate::llm::ProviderImage, crate::llm::LlmError> {
            self.0.generate_image(prompt, size, quality, style).await
        }
    }

    fn script_standard_lesson_path(provider: &MockProvider, title: &str, lo_id: &str) {
        provider.push_completion(
            serde_json::json!({ "objectives": ["know things"], "refined_material": "refined body" }).to_string(),
        );
        provider.push_completion(serde_json::json!({ "misconceptions": [], "confusables": [] }).to_string());
        provider.push_completion(serde_json::json!({ "mini_lesson": "a short lesson" }).to_string());
        provider.push_completion(serde_json::json!({ "terms": [] }).to_string());
        provider.push_completion(
            serde_json::json!({
                "mcqs": [{
                    "id": format!("{title}_mcq_1"),
                    "lo_id": lo_id,
                    "stem": "What is true?",
                    "options": [{"id": "opt_a", "label": "A", "text": "yes", "rationale_wrong": null}],
                    "answer_key": {"label": "A", "option_id": "opt_a", "rationale_right": null},
                }]
            })
            .to_string(),
        );
        provider.push_completion(serde_json::json!({ "short_answers": [] }).to_string());
    }

    #[tokio::test]
    async fn create_unit_standard_flow_produces_a_completed_unit_with_lessons() {
        let (orchestrator, provider) = orchestrator();

        provider.push_completion(
            serde_json::json!({
                "unit_title": "Intro to Rust",
                "learning_objectives": [{"id": "lo_1", "title": "Explain ownership", "description": null, "bloom_level": null}],
                "lessons": [{"title": "Ownership", "lesson_objective": "Explain ownership", "learning_objective_ids": ["lo_1"]}],
                "lesson_count": 1,
            })
            .to_string(),
        );
        provider.push_completion(serde_json::json!({ "summary": "A quick tour of ownership." }).to_string());
        script_standard_lesson_path(&provider, "Ownership", "lo_1");
        provider.push_completion(serde_json::json!({ "prompt": "cover art", "alt_text": "art", "palette": ["#fff"] }).to_string());
        provider.push_completion(serde_json::json!({ "transcript": "Welcome to the show." }).to_string());

        let request = UnitCreationRequest {
            learner_desires: "ownership and borrowing".into(),
            coach_learning_objectives: None,
            source_material: Some("Rust ownership moves values between bindings.".into()),
            target_lesson_count: 1,
            learner_level: LearnerLevel::Beginner,
            flow_type: UnitFlowType::Standard,
            user_id: None,
        };

        let unit_id = orchestrator
            .create_unit(request, ExecutionMode::Sync, CancellationToken::new())
            .await
            .unwrap();

        let unit = orchestrator.store.get_unit(unit_id).await.unwrap();
        assert_eq!(unit.status, UnitStatus::Completed);
        assert_eq!(unit.lesson_order.len(), 1);
        assert!(unit.art_image_id.is_some());
        assert!(unit.podcast_audio_id.is_some());

        let lessons = orchestrator.store.list_lessons_for_unit(unit_id).await.unwrap();
        assert_eq!(lessons.len(), 1);
        assert!(lessons[0].package.is_some());
    }

    #[tokio::test]
    async fn create_unit_fails_the_unit_when_the_plan_flow_fails() {
        let (orchestrator, provider) = orchestrator();
        provider.push_failure(crate::llm::LlmError::Validation("bad source material".into()));

        let request = UnitCreationRequest {
            learner_desires: "anything".into(),
            coach_learning_objectives: None,
            source_material: Some("material".into()),
            target_lesson_count: 1,
            learner_level: LearnerLevel::Beginner,
            flow_type: UnitFlowType::Standard,
            user_id: None,
        };

        let unit_id = orchestrator
            .create_unit(request, ExecutionMode::Sync, CancellationToken::new())
            .await
            .unwrap();

        let unit = orchestrator.store.get_unit(unit_id).await.unwrap();
        assert_eq!(unit.status, UnitStatus::Failed);
        assert!(unit.error_message.is_some());
        assert!(unit.lesson_order.is_empty());
    }
}
