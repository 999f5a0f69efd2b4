//! In-process reference `Store`, backed by `parking_lot` locks over
//! `rustc_hash` maps. Used by the test suite and as the zero-dependency
//! development default.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{FlowRunPage, Store, StoreError};
use crate::domain::{FlowRun, FlowStepRun, Lesson, Unit, LlmRequest};
use crate::ids::{FlowRunId, FlowStepRunId, LessonId, LlmRequestId, UnitId};

#[derive(Default)]
pub struct InMemoryStore {
    flow_runs: RwLock<FxHashMap<FlowRunId, FlowRun>>,
    flow_run_order: RwLock<Vec<FlowRunId>>,
    flow_step_runs: RwLock<FxHashMap<FlowStepRunId, FlowStepRun>>,
    llm_requests: RwLock<FxHashMap<LlmRequestId, LlmRequest>>,
    units: RwLock<FxHashMap<UnitId, Unit>>,
    lessons: RwLock<FxHashMap<LessonId, Lesson>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(kind: &'static str, id: impl std::fmt::Display) -> StoreError {
    StoreError::NotFound { kind, id: id.to_string() }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_flow_run(&self, run: &FlowRun) -> Result<(), StoreError> {
        self.flow_runs.write().insert(run.id, run.clone());
        self.flow_run_order.write().push(run.id);
        Ok(())
    }

    async fn update_flow_run(&self, run: &FlowRun) -> Result<(), StoreError> {
        let mut runs = self.flow_runs.write();
        if !runs.contains_key(&run.id) {
            return Err(not_found("flow_run", run.id));
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_flow_run(&self, id: FlowRunId) -> Result<FlowRun, StoreError> {
        self.flow_runs.read().get(&id).cloned().ok_or_else(|| not_found("flow_run", id))
    }

    async fn list_flow_runs(&self, page: u32, page_size: u32) -> Result<FlowRunPage, StoreError> {
        let order = self.flow_run_order.read();
        let runs = self.flow_runs.read();
        let total = order.len() as u64;
        let start = (page as usize) * (page_size as usize);
        let newest_first: Vec<FlowRunId> = order.iter().rev().copied().collect();
        let page_ids = newest_first.into_iter().skip(start).take(page_size as usize);
        let result = page_ids.filter_map(|id| runs.get(&id).cloned()).collect();
        Ok(FlowRunPage { runs: result, total })
    }

    async fn list_stale_flow_runs(&self, older_than_seconds: i64) -> Result<Vec<FlowRun>, StoreError> {
        let now = Utc::now();
        Ok(self
            .flow_runs
            .read()
            .values()
            .filter(|run| {
                !run.status.is_terminal()
                    && run
                        .last_heartbeat
                        .is_some_and(|hb| (now - hb).num_seconds() >= older_than_seconds)
            })
            .cloned()
            .collect())
    }

    async fn insert_flow_step_run(&self, step: &FlowStepRun) -> Result<(), StoreError> {
        self.flow_step_runs.write().insert(step.id, step.clone());
        Ok(())
    }

    async fn update_flow_step_run(&self, step: &FlowStepRun) -> Result<(), StoreError> {
        let mut steps = self.flow_step_runs.write();
        if !steps.contains_key(&step.id) {
            return Err(not_found("flow_step_run", step.id));
        }
        steps.insert(step.id, step.clone());
        Ok(())
    }

    async fn get_flow_step_run(&self, id: FlowStepRunId) -> Result<FlowStepRun, StoreError> {
        self.flow_step_runs.read().get(&id).cloned().ok_or_else(|| not_found("flow_step_run", id))
    }

    async fn list_flow_step_runs(&self, flow_run_id: FlowRunId) -> Result<Vec<FlowStepRun>, StoreError> {
        let mut steps: Vec<FlowStepRun> = self
            .flow_step_runs
            .read()
            .values()
            .filter(|s| s.flow_run_id == flow_run_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.step_order);
        Ok(steps)
    }

    async fn insert_llm_request(&self, request: &LlmRequest) -> Result<(), StoreError> {
        self.llm_requests.write().insert(request.id, request.clone());
        Ok(())
    }

    async fn update_llm_request(&self, request: &LlmRequest) -> Result<(), StoreError> {
        let mut requests = self.llm_requests.write();
        if !requests.contains_key(&request.id) {
            return Err(not_found("llm_request", request.id));
        }
        requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn get_llm_request(&self, id: LlmRequestId) -> Result<LlmRequest, StoreError> {
        self.llm_requests.read().get(&id).cloned().ok_or_else(|| not_found("llm_request", id))
    }

    async fn upsert_unit(&self, unit: &Unit) -> Result<(), StoreError> {
        self.units.write().insert(unit.id, unit.clone());
        Ok(())
    }

    async fn get_unit(&self, id: UnitId) -> Result<Unit, StoreError> {
        self.units.read().get(&id).cloned().ok_or_else(|| not_found("unit", id))
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StoreError> {
        self.lessons.write().insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Lesson, StoreError> {
        self.lessons.read().get(&id).cloned().ok_or_else(|| not_found("lesson", id))
    }

    async fn list_lessons_for_unit(&self, unit_id: UnitId) -> Result<Vec<Lesson>, StoreError> {
        Ok(self.lessons.read().values().filter(|l| l.unit_id == unit_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExecutionMode, FlowRunStatus};

    #[tokio::test]
    async fn round_trips_a_flow_run() {
        let store = InMemoryStore::new();
        let run = FlowRun::new("unit_creation", ExecutionMode::Sync, serde_json::json!({}), 3);
        store.insert_flow_run(&run).await.unwrap();
        let fetched = store.get_flow_run(run.id).await.unwrap();
        assert_eq!(fetched.id, run.id);
        assert_eq!(fetched.status, FlowRunStatus::Pending);
    }

    #[tokio::test]
    async fn list_flow_runs_is_newest_first() {
        let store = InMemoryStore::new();
        let first = FlowRun::new("a", ExecutionMode::Sync, serde_json::json!({}), 1);
        let second = FlowRun::new("b", ExecutionMode::Sync, serde_json::json!({}), 1);
        store.insert_flow_run(&first).await.unwrap();
        store.insert_flow_run(&second).await.unwrap();
        let page = store.list_flow_runs(0, 10).await.unwrap();
        assert_eq!(page.runs[0].id, second.id);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn update_missing_flow_run_fails() {
        let store = InMemoryStore::new();
        let run = FlowRun::new("a", ExecutionMode::Sync, serde_json::json!({}), 1);
        let err = store.update_flow_run(&run).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
