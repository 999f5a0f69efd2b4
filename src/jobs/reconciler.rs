//! Stall reconciler: on a timer, finds jobs whose progress has gone quiet
//! and fails them (`spec.md` §4.5, §5).
//!
//! Two independent sweeps run each tick. The in-process sweep watches
//! `creation_progress.phase` on jobs this process submitted and cancels
//! their token the moment the phase stops advancing, so the running flow
//! notices at its next heartbeat tick. The store sweep catches anything the
//! in-process registry can't see — a `FlowRun` row left non-terminal by a
//! crashed process — by going straight to `last_heartbeat`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::domain::{FlowRunStatus, UnitStatus};

use super::manager::JobManager;

const STALLED_MESSAGE: &str = "stalled";

pub struct StallReconciler {
    manager: Arc<JobManager>,
    poll_interval: Duration,
}

impl StallReconciler {
    #[must_use]
    pub fn new(manager: Arc<JobManager>, poll_interval: Duration) -> Self {
        Self { manager, poll_interval }
    }

    /// Runs until `cancellation` fires. Intended to be spawned as its own task
    /// alongside the HTTP server / worker loop.
    pub async fn run(self, cancellation: tokio_util::sync::CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                () = cancellation.cancelled() => return,
                _ = ticker.tick() => self.reconcile_once().await,
            }
        }
    }

    pub async fn reconcile_once(&self) {
        self.sweep_tracked_jobs().await;
        self.sweep_stale_flow_runs().await;
    }

    async fn sweep_tracked_jobs(&self) {
        let stalled_unit_ids: Vec<_> = {
            let mut tracked = self.manager.tracked.write().await;
            let now = Instant::now();
            let mut stalled = Vec::new();
            for (unit_id, job) in tracked.iter_mut() {
                let phase = self.current_phase(*unit_id).await;
                if let Some(phase) = phase {
                    if phase != job.last_phase {
                        job.last_phase = phase;
                        job.last_progress_at = now;
                        continue;
                    }
                }
                if now.duration_since(job.last_progress_at) >= self.manager.stall_timeout {
                    job.cancellation.cancel();
                    stalled.push(*unit_id);
                }
            }
            for unit_id in &stalled {
                tracked.remove(unit_id);
            }
            stalled
        };

        for unit_id in stalled_unit_ids {
            warn!(%unit_id, "job stalled, cancelling and marking unit failed");
            if let Ok(mut unit) = self.manager.store.get_unit(unit_id).await {
                if unit.status != UnitStatus::Completed && unit.status != UnitStatus::Failed {
                    unit.status = UnitStatus::Failed;
                    unit.error_message = Some(STALLED_MESSAGE.to_string());
                    self.manager.store.upsert_unit(&unit).await.ok();
                }
            }
        }
    }

    async fn current_phase(&self, unit_id: crate::ids::UnitId) -> Option<String> {
        let unit = self.manager.store.get_unit(unit_id).await.ok()?;
        unit.creation_progress?.get("phase")?.as_str().map(str::to_string)
    }

    /// Catches `FlowRun` rows left stalled by a process that crashed before
    /// ever cancelling its own tokens.
    async fn sweep_stale_flow_runs(&self) {
        let older_than_seconds = i64::try_from(self.manager.stall_timeout.as_secs()).unwrap_or(i64::MAX);
        let Ok(stale) = self.manager.store.list_stale_flow_runs(older_than_seconds).await else {
            return;
        };
        for mut run in stale {
            if run.status.is_terminal() {
                continue;
            }
            info!(flow_run_id = %run.id, flow_name = %run.flow_name, "flow run stalled, marking failed");
            run.mark_terminal(FlowRunStatus::Failed, Some(STALLED_MESSAGE.to_string()));
            self.manager.store.update_flow_run(&run).await.ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::{ExecutionMode, FlowRun};
    use crate::llm::{LlmGateway, MockProvider};
    use crate::objectstore::{FsObjectStore, ObjectStore};
    use crate::orchestrator::UnitOrchestrator;
    use crate::store::{InMemoryStore, Store};

    fn manager() -> Arc<JobManager> {
        let config = Config::for_tests();
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let provider = Arc::new(MockProvider::new());
        let llm = Arc::new(LlmGateway::new(ClonedProvider(provider), store.clone(), &config));
        let object_store: Arc<dyn ObjectStore> =
            Arc::new(FsObjectStore::new(std::env::temp_dir().join(format!("lessonforge-reconciler-test-{}", uuid::Uuid::new_v4())), "test-bucket"));
        let orchestrator = Arc::new(UnitOrchestrator::new(llm, store.clone(), object_store, config.lesson_parallelism, config.heartbeat_interval));
        Arc::new(JobManager::new(store, orchestrator, Duration::from_millis(10)))
    }

    struct ClonedProvider(Arc<MockProvider>);

    #[async_trait::async_trait]
    impl crate::llm::LlmProvider for ClonedProvider {
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

    #[tokio::test]
    async fn marks_stale_flow_run_failed() {
        let manager = manager();
        let mut run = FlowRun::new("unit_creation", ExecutionMode::Background, serde_json::json!({}), 3);
        run.mark_running();
        run.last_heartbeat = Some(chrono::Utc::now() - chrono::Duration::seconds(3600));
        manager.store.insert_flow_run(&run).await.unwrap();

        let reconciler = StallReconciler::new(manager.clone(), Duration::from_millis(10));
        reconciler.reconcile_once().await;

        let reloaded = manager.store.get_flow_run(run.id).await.unwrap();
        assert_eq!(reloaded.status, FlowRunStatus::Failed);
        assert_eq!(reloaded.error_message.as_deref(), Some("stalled"));
    }
}
