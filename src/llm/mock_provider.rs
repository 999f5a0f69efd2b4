//! Deterministic [`LlmProvider`] used by the test suite and the in-crate
//! `MockProvider` default (`llm_provider = "mock"` in [`crate::config::Config::for_tests`]).
//!
//! Tests script responses with [`MockProvider::push_completion`] /
//! [`MockProvider::push_failure`]; an un-scripted call falls back to a
//! trivial deterministic echo so gateway-level tests (caching, retries,
//! usage accounting) don't need to script every call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::LlmError;
use super::provider::{ImagePayload, LlmProvider, ProviderAudio, ProviderCompletion, ProviderImage, ProviderRequest};

enum Outcome {
    Complete(ProviderCompletion),
    Fail(LlmError),
}

#[derive(Default)]
pub struct MockProvider {
    scripted: Mutex<VecDeque<Outcome>>,
    calls: AtomicUsize,
}

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion with the given text content.
    pub fn push_completion(&self, content: impl Into<String>) {
        let content = content.into();
        let tokens = (content.split_whitespace().count() as i64).max(1);
        self.scripted.lock().push_back(Outcome::Complete(ProviderCompletion {
            content: content.clone(),
            input_tokens: 8,
            output_tokens: tokens,
            provider_response_id: Some(format!("mock-{}", self.calls.load(Ordering::Relaxed))),
            system_fingerprint: None,
            raw: serde_json::json!({ "content": content }),
        }));
    }

    /// Queue a failure for the next `complete` call.
    pub fn push_failure(&self, error: LlmError) {
        self.scripted.lock().push_back(Outcome::Fail(error));
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderCompletion, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(outcome) = self.scripted.lock().pop_front() {
            return match outcome {
                Outcome::Complete(completion) => Ok(completion),
                Outcome::Fail(error) => Err(error),
            };
        }
        let last_user_text = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str().unwrap_or_default().to_string())
            .unwrap_or_default();
        let content = serde_json::json!({ "echo": last_user_text }).to_string();
        Ok(ProviderCompletion {
            input_tokens: 8,
            output_tokens: 4,
            provider_response_id: Some(format!("mock-{}", self.calls.load(Ordering::Relaxed))),
            system_fingerprint: None,
            raw: serde_json::json!({ "content": content }),
            content,
        })
    }

    async fn generate_audio(
        &self,
        text: &str,
        _voice: &str,
        _model: &str,
        _audio_format: &str,
        _speed: f32,
    ) -> Result<ProviderAudio, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(ProviderAudio {
            bytes: text.as_bytes().to_vec(),
            duration_seconds: (text.split_whitespace().count() as f64) * 0.4,
        })
    }

    async fn generate_image(
        &self,
        prompt: &str,
        _size: &str,
        _quality: Option<&str>,
        _style: Option<&str>,
    ) -> Result<ProviderImage, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(ProviderImage {
            payload: ImagePayload::Url(format!("mock://images/{}", sanitize(prompt))),
            revised_prompt: Some(prompt.to_string()),
        })
    }
}

fn sanitize(prompt: &str) -> String {
    prompt
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect::<String>()
        .chars()
        .take(48)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str) -> ProviderRequest {
        ProviderRequest {
            messages: vec![crate::domain::LlmMessageRecord::text("user", text)],
            model: "mock-model".into(),
            temperature: 0.0,
            max_output_tokens: 256,
            response_schema_name: None,
        }
    }

    #[tokio::test]
    async fn unscripted_call_echoes_last_user_message() {
        let provider = MockProvider::new();
        let completion = provider.complete(&request("hello")).await.unwrap();
        assert!(completion.content.contains("hello"));
    }

    #[tokio::test]
    async fn scripted_failure_is_returned_once() {
        let provider = MockProvider::new();
        provider.push_failure(LlmError::RateLimited);
        provider.push_completion("{}");
        assert!(matches!(provider.complete(&request("x")).await, Err(LlmError::RateLimited)));
        assert!(provider.complete(&request("x")).await.is_ok());
    }
}
