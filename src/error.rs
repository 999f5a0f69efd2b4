//! Shared error taxonomy.
//!
//! `spec.md` §7 defines one taxonomy (`validation_error`, `provider_error`,
//! `rate_limited`, `timeout`, `transport_error`, `invalid_response`,
//! `cancelled`, `stalled`, `internal_error`) shared by every persisted row's
//! `(error_type, error_message)` pair. [`ErrorKind`] is that taxonomy as a
//! Rust enum; every module error type converts into it via
//! [`Classify::classify`] so the audit trail and the in-process `Result`
//! stay in sync by construction rather than by convention.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    ProviderError,
    RateLimited,
    Timeout,
    TransportError,
    InvalidResponse,
    Cancelled,
    Stalled,
    InternalError,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::ProviderError => "provider_error",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::TransportError => "transport_error",
            Self::InvalidResponse => "invalid_response",
            Self::Cancelled => "cancelled",
            Self::Stalled => "stalled",
            Self::InternalError => "internal_error",
        }
    }

    /// Whether a call that failed with this kind is eligible for the
    /// gateway's retry policy (`spec.md` §4.1: rate_limited, timeout, and
    /// transient transport_error only).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout | Self::TransportError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Converts a module-local error into the shared taxonomy for persistence.
pub trait Classify {
    fn classify(&self) -> ErrorKind;
}

/// Top-level error aggregating every module boundary, returned by the
/// crate's outermost public operations (job submission, admin reads).
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CoreError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] crate::llm::LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Step(#[from] crate::steps::StepError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Flow(#[from] crate::flows::FlowError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Orchestrator(#[from] crate::orchestrator::OrchestratorError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Job(#[from] crate::jobs::JobError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Admin(#[from] crate::admin::AdminError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error(transparent)]
    #[diagnostic(code(lessonforge::error::config))]
    Config(#[from] crate::config::ConfigError),
}

impl Classify for CoreError {
    fn classify(&self) -> ErrorKind {
        match self {
            CoreError::Llm(e) => e.classify(),
            CoreError::Step(e) => e.classify(),
            CoreError::Flow(e) => e.classify(),
            CoreError::Orchestrator(e) => e.classify(),
            CoreError::Job(e) => e.classify(),
            CoreError::Admin(e) => e.classify(),
            CoreError::Store(_) => ErrorKind::InternalError,
            CoreError::Config(_) => ErrorKind::InternalError,
        }
    }
}
