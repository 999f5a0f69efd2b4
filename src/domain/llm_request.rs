//! `LlmRequest`: one row per model call, written by [`crate::llm::DefaultLlmGateway`]
//! and never mutated by anything else (`spec.md` §3, §4.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::ids::LlmRequestId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmRequestStatus {
    Pending,
    Completed,
    Failed,
}

/// One message in a call, whose content may be plain text or a list of
/// structured parts (text + image URL) for vision calls.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmMessageRecord {
    pub role: String,
    pub content: serde_json::Value,
}

impl LlmMessageRecord {
    #[must_use]
    pub fn text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: serde_json::Value::String(text.into()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmRequest {
    pub id: LlmRequestId,
    pub user_id: Option<String>,
    pub provider: String,
    pub model: String,
    pub api_variant: String,
    pub messages: Vec<LlmMessageRecord>,
    pub request_payload: serde_json::Value,
    pub response_raw: Option<serde_json::Value>,
    pub response_content: Option<String>,
    pub provider_response_id: Option<String>,
    pub system_fingerprint: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub additional_params: Option<serde_json::Value>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub tokens_used: i64,
    pub cost_estimate: f64,
    pub status: LlmRequestStatus,
    pub error_type: Option<ErrorKind>,
    pub error_message: Option<String>,
    /// 1-based; counts attempts made, including the first.
    pub retry_attempt: u32,
    pub cached: bool,
    pub execution_time_ms: i64,
    pub created_at: DateTime<Utc>,
    pub response_created_at: Option<DateTime<Utc>>,
}

impl LlmRequest {
    /// Construct the `pending` row the gateway inserts before it ever talks
    /// to a provider.
    #[must_use]
    pub fn new_pending(
        provider: impl Into<String>,
        model: impl Into<String>,
        api_variant: impl Into<String>,
        messages: Vec<LlmMessageRecord>,
        request_payload: serde_json::Value,
        temperature: Option<f32>,
        max_output_tokens: Option<u32>,
    ) -> Self {
        Self {
            id: LlmRequestId::new(),
            user_id: None,
            provider: provider.into(),
            model: model.into(),
            api_variant: api_variant.into(),
            messages,
            request_payload,
            response_raw: None,
            response_content: None,
            provider_response_id: None,
            system_fingerprint: None,
            temperature,
            max_output_tokens,
            additional_params: None,
            input_tokens: None,
            output_tokens: None,
            tokens_used: 0,
            cost_estimate: 0.0,
            status: LlmRequestStatus::Pending,
            error_type: None,
            error_message: None,
            retry_attempt: 1,
            cached: false,
            execution_time_ms: 0,
            created_at: Utc::now(),
            response_created_at: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn complete(
        &mut self,
        response_raw: serde_json::Value,
        response_content: String,
        input_tokens: i64,
        output_tokens: i64,
        cost_estimate: f64,
        execution_time_ms: i64,
        cached: bool,
    ) {
        self.response_raw = Some(response_raw);
        self.response_content = Some(response_content);
        self.input_tokens = Some(input_tokens);
        self.output_tokens = Some(output_tokens);
        self.tokens_used = input_tokens + output_tokens;
        self.cost_estimate = cost_estimate;
        self.execution_time_ms = execution_time_ms;
        self.cached = cached;
        self.status = LlmRequestStatus::Completed;
        self.response_created_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error_type: ErrorKind, error_message: impl Into<String>, execution_time_ms: i64) {
        self.status = LlmRequestStatus::Failed;
        self.error_type = Some(error_type);
        self.error_message = Some(error_message.into());
        self.execution_time_ms = execution_time_ms;
    }

    /// `spec.md` §3 invariant: completed ⟹ `response_raw` present; failed ⟹
    /// `error_type`/`error_message` present.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        match self.status {
            LlmRequestStatus::Pending => true,
            LlmRequestStatus::Completed => self.response_raw.is_some(),
            LlmRequestStatus::Failed => self.error_type.is_some() && self.error_message.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> LlmRequest {
        LlmRequest::new_pending(
            "mock",
            "mock-model",
            "chat",
            vec![LlmMessageRecord::text("user", "hi")],
            serde_json::json!({}),
            Some(0.0),
            Some(256),
        )
    }

    #[test]
    fn pending_request_is_well_formed() {
        assert!(pending().is_well_formed());
    }

    #[test]
    fn completed_request_requires_response_raw() {
        let mut req = pending();
        req.complete(serde_json::json!({"ok": true}), "hi".into(), 3, 2, 0.0001, 12, false);
        assert!(req.is_well_formed());
        assert_eq!(req.tokens_used, 5);
    }

    #[test]
    fn failed_request_requires_error_fields() {
        let mut req = pending();
        req.fail(ErrorKind::Timeout, "deadline exceeded", 30_000);
        assert!(req.is_well_formed());
    }
}
