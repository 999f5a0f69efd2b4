//! Errors surfaced by the content orchestrator (`spec.md` §4.4, §7).

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::lesson::PackageInvariantError;
use crate::error::{Classify, ErrorKind};
use crate::flows::FlowError;
use crate::objectstore::ObjectStoreError;
use crate::steps::StepError;
use crate::store::StoreError;

#[derive(Debug, Error, Diagnostic)]
pub enum OrchestratorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    #[diagnostic(code(lessonforge::orchestrator::store))]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(code(lessonforge::orchestrator::object_store))]
    ObjectStore(#[from] ObjectStoreError),

    #[error("assembled lesson package violates an invariant: {0}")]
    #[diagnostic(code(lessonforge::orchestrator::package))]
    Package(#[from] PackageInvariantError),

    #[error("unit creation produced zero lessons")]
    #[diagnostic(code(lessonforge::orchestrator::no_lessons))]
    NoLessonsProduced,
}

impl Classify for OrchestratorError {
    fn classify(&self) -> ErrorKind {
        match self {
            Self::Flow(e) => e.classify(),
            Self::Step(e) => e.classify(),
            Self::Store(_) => ErrorKind::InternalError,
            Self::ObjectStore(_) => ErrorKind::InternalError,
            Self::Package(_) => ErrorKind::ValidationError,
            Self::NoLessonsProduced => ErrorKind::InternalError,
        }
    }
}
