//! Errors surfaced by step execution (`spec.md` §4.2, §7).

use miette::Diagnostic;
use thiserror::Error;

use crate::error::{Classify, ErrorKind};
use crate::llm::LlmError;
use crate::store::StoreError;

#[derive(Debug, Error, Diagnostic)]
pub enum StepError {
    #[error("input validation failed: {0}")]
    #[diagnostic(code(lessonforge::step::validation))]
    Validation(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error("output failed validation after repair: {0}")]
    #[diagnostic(code(lessonforge::step::invalid_response))]
    InvalidResponse(String),

    #[error(transparent)]
    #[diagnostic(code(lessonforge::step::store))]
    Store(#[from] StoreError),

    #[error("step was cancelled")]
    #[diagnostic(code(lessonforge::step::cancelled))]
    Cancelled,
}

impl Classify for StepError {
    fn classify(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Llm(e) => e.classify(),
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
            Self::Store(_) => ErrorKind::InternalError,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}
