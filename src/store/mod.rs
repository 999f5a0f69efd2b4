//! Persistence boundary.
//!
//! [`Store`] is the one trait every other module writes rows through. It
//! names what gets persisted, not how; [`memory::InMemoryStore`] backs tests
//! and the default development loop, [`sqlite::SqliteStore`] backs real
//! deployments (feature `sqlite-store`).

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::domain::{FlowRun, FlowStepRun, Lesson, LlmRequest, Unit};
use crate::error::{Classify, ErrorKind};
use crate::ids::{FlowRunId, FlowStepRunId, LessonId, LlmRequestId, UnitId};

pub use memory::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    #[diagnostic(code(lessonforge::store::not_found))]
    NotFound { kind: &'static str, id: String },

    #[error("conflicting write: {0}")]
    #[diagnostic(code(lessonforge::store::conflict))]
    Conflict(String),

    #[error("storage backend error: {0}")]
    #[diagnostic(code(lessonforge::store::backend))]
    Backend(String),
}

impl Classify for StoreError {
    fn classify(&self) -> ErrorKind {
        ErrorKind::InternalError
    }
}

/// A page of newest-first flow runs, for the admin read model.
#[derive(Debug, Clone)]
pub struct FlowRunPage {
    pub runs: Vec<FlowRun>,
    pub total: u64,
}

/// Row-scoped persistence for every aggregate in `domain`. Every method is a
/// single-row insert or update; nothing here spans a cross-row transaction.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_flow_run(&self, run: &FlowRun) -> Result<(), StoreError>;
    async fn update_flow_run(&self, run: &FlowRun) -> Result<(), StoreError>;
    async fn get_flow_run(&self, id: FlowRunId) -> Result<FlowRun, StoreError>;
    async fn list_flow_runs(&self, page: u32, page_size: u32) -> Result<FlowRunPage, StoreError>;
    /// Flow runs whose `last_heartbeat` is older than `older_than_seconds`
    /// and whose status is not yet terminal; feeds the stall reconciler.
    async fn list_stale_flow_runs(&self, older_than_seconds: i64) -> Result<Vec<FlowRun>, StoreError>;

    async fn insert_flow_step_run(&self, step: &FlowStepRun) -> Result<(), StoreError>;
    async fn update_flow_step_run(&self, step: &FlowStepRun) -> Result<(), StoreError>;
    async fn get_flow_step_run(&self, id: FlowStepRunId) -> Result<FlowStepRun, StoreError>;
    async fn list_flow_step_runs(&self, flow_run_id: FlowRunId) -> Result<Vec<FlowStepRun>, StoreError>;

    async fn insert_llm_request(&self, request: &LlmRequest) -> Result<(), StoreError>;
    async fn update_llm_request(&self, request: &LlmRequest) -> Result<(), StoreError>;
    async fn get_llm_request(&self, id: LlmRequestId) -> Result<LlmRequest, StoreError>;

    async fn upsert_unit(&self, unit: &Unit) -> Result<(), StoreError>;
    async fn get_unit(&self, id: UnitId) -> Result<Unit, StoreError>;

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StoreError>;
    async fn get_lesson(&self, id: LessonId) -> Result<Lesson, StoreError>;
    async fn list_lessons_for_unit(&self, unit_id: UnitId) -> Result<Vec<Lesson>, StoreError>;
}
