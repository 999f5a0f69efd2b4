//! Errors surfaced by the admin read model (`spec.md` §4.6).

use miette::Diagnostic;
use thiserror::Error;

use crate::error::{Classify, ErrorKind};
use crate::store::StoreError;

#[derive(Debug, Error, Diagnostic)]
pub enum AdminError {
    #[error(transparent)]
    #[diagnostic(code(lessonforge::admin::store))]
    Store(#[from] StoreError),

    #[error("{kind} {id} not found under the requested parent")]
    #[diagnostic(code(lessonforge::admin::not_found))]
    NotFound { kind: &'static str, id: String },
}

impl Classify for AdminError {
    fn classify(&self) -> ErrorKind {
        match self {
            Self::Store(_) => ErrorKind::InternalError,
            Self::NotFound { .. } => ErrorKind::ValidationError,
        }
    }
}
