//! Maps every module error into the `{error: {kind, message, details?}}`
//! envelope and status code table from `spec.md` §6.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::admin::AdminError;
use crate::error::{Classify, CoreError, ErrorKind};
use crate::jobs::JobError;
use crate::store::StoreError;

pub struct ApiError(pub CoreError);

impl<E: Into<CoreError>> From<E> for ApiError {
    fn from(error: E) -> Self {
        Self(error.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: ErrorKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = http_status(&self.0);
        let body = ErrorBody { error: ErrorDetail { kind: self.0.classify(), message: self.0.to_string(), details: None } };
        (status, Json(body)).into_response()
    }
}

/// Status-code table from `spec.md` §6: `not_found`/`conflict` take
/// precedence over the generic `ErrorKind` mapping since several module
/// errors wrap the same underlying `StoreError`.
fn http_status(error: &CoreError) -> StatusCode {
    match error {
        CoreError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
        CoreError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
        CoreError::Job(JobError::Store(StoreError::NotFound { .. }) | JobError::NotFound(_)) => StatusCode::NOT_FOUND,
        CoreError::Admin(AdminError::Store(StoreError::NotFound { .. }) | AdminError::NotFound { .. }) => StatusCode::NOT_FOUND,
        _ => match error.classify() {
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}
