//! Errors surfaced by flow execution (`spec.md` §4.3, §7).

use miette::Diagnostic;
use thiserror::Error;

use crate::error::{Classify, ErrorKind};
use crate::steps::StepError;
use crate::store::StoreError;

#[derive(Debug, Error, Diagnostic)]
pub enum FlowError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    #[diagnostic(code(lessonforge::flow::store))]
    Store(#[from] StoreError),

    #[error("flow was cancelled")]
    #[diagnostic(code(lessonforge::flow::cancelled))]
    Cancelled,

    #[error("flow stalled: no heartbeat within the configured timeout")]
    #[diagnostic(code(lessonforge::flow::stalled))]
    Stalled,
}

impl Classify for FlowError {
    fn classify(&self) -> ErrorKind {
        match self {
            Self::Step(e) => e.classify(),
            Self::Store(_) => ErrorKind::InternalError,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Stalled => ErrorKind::Stalled,
        }
    }
}
