//! Errors surfaced by the LLM gateway (`spec.md` §4.1, §7).

use miette::Diagnostic;
use thiserror::Error;

use crate::error::{Classify, ErrorKind};

#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("request validation failed: {0}")]
    #[diagnostic(code(lessonforge::llm::validation))]
    Validation(String),

    #[error("provider returned an error: {0}")]
    #[diagnostic(code(lessonforge::llm::provider))]
    Provider(String),

    #[error("provider rate-limited the request")]
    #[diagnostic(code(lessonforge::llm::rate_limited), help("retried automatically up to the configured max_retries"))]
    RateLimited,

    #[error("call exceeded its deadline")]
    #[diagnostic(code(lessonforge::llm::timeout))]
    Timeout,

    #[error("transport failure: {0}")]
    #[diagnostic(code(lessonforge::llm::transport))]
    Transport(String),

    #[error("provider response could not be parsed into the expected shape: {0}")]
    #[diagnostic(code(lessonforge::llm::invalid_response))]
    InvalidResponse(String),

    #[error("call was cancelled")]
    #[diagnostic(code(lessonforge::llm::cancelled))]
    Cancelled,
}

impl Classify for LlmError {
    fn classify(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Provider(_) => ErrorKind::ProviderError,
            Self::RateLimited => ErrorKind::RateLimited,
            Self::Timeout => ErrorKind::Timeout,
            Self::Transport(_) => ErrorKind::TransportError,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}
