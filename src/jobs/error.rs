//! Errors surfaced by job submission and the stall reconciler (`spec.md` §4.5).

use miette::Diagnostic;
use thiserror::Error;

use crate::error::{Classify, ErrorKind};
use crate::orchestrator::OrchestratorError;
use crate::store::StoreError;

#[derive(Debug, Error, Diagnostic)]
pub enum JobError {
    #[error("invalid job submission: {0}")]
    #[diagnostic(code(lessonforge::jobs::validation))]
    Validation(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    #[diagnostic(code(lessonforge::jobs::store))]
    Store(#[from] StoreError),

    #[error("job not found: {0}")]
    #[diagnostic(code(lessonforge::jobs::not_found))]
    NotFound(crate::ids::UnitId),
}

impl Classify for JobError {
    fn classify(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Orchestrator(e) => e.classify(),
            Self::Store(_) => ErrorKind::InternalError,
            Self::NotFound(_) => ErrorKind::ValidationError,
        }
    }
}
