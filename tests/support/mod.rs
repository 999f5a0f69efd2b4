//! Shared harness for the end-to-end scenario and invariant tests. Builds a
//! real `UnitOrchestrator`/`JobManager` pair over an `InMemoryStore` and a
//! scriptable `MockProvider`, the same wiring `orchestrator::flows`'s own
//! test module uses, just promoted so `tests/scenarios.rs` and
//! `tests/invariants.rs` can both reach it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use lessonforge::config::Config;
use lessonforge::domain::{LearnerLevel, UnitFlowType};
use lessonforge::jobs::JobManager;
use lessonforge::llm::{LlmError, LlmGateway, LlmProvider, MockProvider, ProviderAudio, ProviderCompletion, ProviderImage, ProviderRequest};
use lessonforge::objectstore::{FsObjectStore, ObjectStore};
use lessonforge::orchestrator::{UnitCreationRequest, UnitOrchestrator};
use lessonforge::store::{InMemoryStore, Store};

/// Delegates to a shared `MockProvider` handle so the test keeps a reference
/// it can keep scripting after handing ownership into `LlmGateway::new`.
pub struct SharedProvider(pub Arc<MockProvider>);

#[async_trait]
impl LlmProvider for SharedProvider {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderCompletion, LlmError> {
        self.0.complete(request).await
    }

    async fn generate_audio(&self, text: &str, voice: &str, model: &str, audio_format: &str, speed: f32) -> Result<ProviderAudio, LlmError> {
        self.0.generate_audio(text, voice, model, audio_format, speed).await
    }

    async fn generate_image(&self, prompt: &str, size: &str, quality: Option<&str>, style: Option<&str>) -> Result<ProviderImage, LlmError> {
        self.0.generate_image(prompt, size, quality, style).await
    }
}

pub struct Harness {
    pub store: Arc<dyn Store>,
    pub provider: Arc<MockProvider>,
    pub orchestrator: Arc<UnitOrchestrator>,
    pub manager: Arc<JobManager>,
}

/// `lesson_parallelism` is exposed so fan-out scenarios that need a
/// deterministic interleaving of the shared `MockProvider`'s scripted queue
/// can force sequential lesson execution (`parallelism = 1`).
pub fn harness(lesson_parallelism: usize, stall_timeout: Duration) -> Harness {
    let mut config = Config::for_tests();
    config.lesson_parallelism = lesson_parallelism;
    config.stall_timeout = stall_timeout;

    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let provider = Arc::new(MockProvider::new());
    let llm = Arc::new(LlmGateway::new(SharedProvider(provider.clone()), store.clone(), &config));
    let object_store: Arc<dyn ObjectStore> =
        Arc::new(FsObjectStore::new(std::env::temp_dir().join(format!("lessonforge-scenario-test-{}", uuid::Uuid::new_v4())), "test-bucket"));
    let orchestrator = Arc::new(UnitOrchestrator::new(llm, store.clone(), object_store, config.lesson_parallelism, config.heartbeat_interval));
    let manager = Arc::new(JobManager::new(store.clone(), orchestrator.clone(), config.stall_timeout));
    Harness { store, provider, orchestrator, manager }
}

pub fn request(learner_desires: &str, target_lesson_count: u32, source_material: Option<&str>, flow_type: UnitFlowType) -> UnitCreationRequest {
    UnitCreationRequest {
        learner_desires: learner_desires.to_string(),
        coach_learning_objectives: None,
        source_material: source_material.map(str::to_string),
        target_lesson_count,
        learner_level: LearnerLevel::Beginner,
        flow_type,
        user_id: None,
    }
}

/// Scripts `ExtractUnitMetadata`'s response: a unit title, one learning
/// objective per `lo_ids` entry, and one lesson plan entry per
/// `lessons`, each referencing `lo_ids[i]`.
pub fn script_unit_plan(provider: &MockProvider, unit_title: &str, lessons: &[&str], lo_ids: &[&str]) {
    let learning_objectives: Vec<_> = lo_ids
        .iter()
        .map(|id| serde_json::json!({ "id": id, "title": format!("Understand {id}"), "description": null, "bloom_level": null }))
        .collect();
    let lesson_entries: Vec<_> = lessons
        .iter()
        .zip(lo_ids.iter())
        .map(|(title, lo_id)| serde_json::json!({ "title": title, "lesson_objective": title, "learning_objective_ids": [lo_id] }))
        .collect();
    provider.push_completion(
        serde_json::json!({
            "unit_title": unit_title,
            "learning_objectives": learning_objectives,
            "lessons": lesson_entries,
            "lesson_count": lessons.len(),
        })
        .to_string(),
    );
}

pub fn script_unit_summary(provider: &MockProvider, summary: &str) {
    provider.push_completion(serde_json::json!({ "summary": summary }).to_string());
}

pub fn script_unit_art(provider: &MockProvider) {
    provider.push_completion(serde_json::json!({ "prompt": "cover art", "alt_text": "art", "palette": ["#fff"] }).to_string());
}

pub fn script_podcast(provider: &MockProvider, transcript: &str) {
    provider.push_completion(serde_json::json!({ "transcript": transcript }).to_string());
}

/// Scripts the six `LessonCreationFlow` (standard) calls in step order:
/// metadata, misconception bank, didactic snippet, glossary, MCQs, short
/// answers.
pub fn script_standard_lesson(provider: &MockProvider, title: &str, lo_id: &str) {
    provider.push_completion(serde_json::json!({ "objectives": ["know things"], "refined_material": "refined body" }).to_string());
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
