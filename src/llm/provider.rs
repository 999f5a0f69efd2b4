//! The [`LlmProvider`] trait: the seam between the gateway's retry/cache/
//! persistence policy and whatever actually talks to a model API.

use async_trait::async_trait;

use super::error::LlmError;
use crate::domain::LlmMessageRecord;

/// What the gateway asks a provider to do for one text/structured call.
#[derive(Clone, Debug)]
pub struct ProviderRequest {
    pub messages: Vec<LlmMessageRecord>,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Name of the caller's `Outputs` type, present for structured calls so
    /// the provider can be instructed to emit a schema-conforming value.
    pub response_schema_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ProviderCompletion {
    pub content: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub provider_response_id: Option<String>,
    pub system_fingerprint: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Clone, Debug)]
pub struct ProviderAudio {
    pub bytes: Vec<u8>,
    pub duration_seconds: f64,
}

#[derive(Clone, Debug)]
pub enum ImagePayload {
    Url(String),
    Bytes(Vec<u8>),
}

#[derive(Clone, Debug)]
pub struct ProviderImage {
    pub payload: ImagePayload,
    pub revised_prompt: Option<String>,
}

/// A single upstream model backend. Implementations do not retry, cache, or
/// persist anything — that policy lives entirely in
/// [`super::gateway::DefaultLlmGateway`].
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderCompletion, LlmError>;

    async fn generate_audio(
        &self,
        text: &str,
        voice: &str,
        model: &str,
        audio_format: &str,
        speed: f32,
    ) -> Result<ProviderAudio, LlmError>;

    async fn generate_image(
        &self,
        prompt: &str,
        size: &str,
        quality: Option<&str>,
        style: Option<&str>,
    ) -> Result<ProviderImage, LlmError>;
}
