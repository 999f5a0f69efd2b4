//! The LLM gateway: the single chokepoint every model call passes through
//! (`spec.md` §4.1). Owns retry/backoff, the optional response cache, cost
//! accounting, and the request-log persistence that makes every call
//! auditable after the fact.
//!
//! `LlmGateway` is a concrete struct rather than a trait: the only seam
//! that needs to vary per-backend is [`super::provider::LlmProvider`], which
//! it holds as `Arc<dyn LlmProvider>`. Keeping the gateway itself concrete
//! (rather than `Arc<dyn LlmGateway>`) is what lets `generate_structured`
//! be a plain generic method instead of fighting object safety.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::cache::{CacheKey, ResponseCache, CACHE_TEMP_THRESHOLD};
use super::error::LlmError;
use super::pricing::PricingTable;
use super::provider::{ImagePayload, LlmProvider, ProviderCompletion, ProviderRequest};
use crate::config::Config;
use crate::domain::{LlmMessageRecord, LlmRequest};
use crate::error::Classify;
use crate::ids::LlmRequestId;
use crate::store::Store;

/// Per-call overrides; every field defaults to the gateway's configured
/// default when omitted.
#[derive(Clone, Default)]
pub struct LlmCallOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub user_id: Option<String>,
    pub cancellation: Option<CancellationToken>,
}

#[derive(Clone, Debug)]
pub struct GatewayResponse {
    pub content: String,
    pub model: String,
    pub provider: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub tokens_used: i64,
    pub cost_estimate: f64,
    pub cached: bool,
    pub response_time_ms: i64,
    pub provider_response_id: Option<String>,
    pub system_fingerprint: Option<String>,
}

#[derive(Clone, Debug)]
pub struct GatewayAudio {
    pub bytes: Vec<u8>,
    pub duration_seconds: f64,
}

#[derive(Clone, Debug)]
pub struct GatewayImage {
    pub payload: ImagePayload,
    pub revised_prompt: Option<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GatewayUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub tokens_used: i64,
    pub cost_estimate: f64,
}

pub struct LlmGateway {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn Store>,
    concurrency: Arc<Semaphore>,
    cache: Option<Arc<dyn ResponseCache>>,
    pricing: PricingTable,
    default_model: String,
    max_retries: u32,
    call_timeout: Duration,
}

impl LlmGateway {
    #[must_use]
    pub fn new(provider: impl LlmProvider + 'static, store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            provider: Arc::new(provider),
            store,
            concurrency: Arc::new(Semaphore::new(config.llm_concurrency)),
            cache: None,
            pricing: PricingTable::new(),
            default_model: config.llm_model_default.clone(),
            max_retries: config.llm_max_retries,
            call_timeout: config.llm_timeout,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn resolve_model(&self, requested: Option<String>) -> String {
        requested.unwrap_or_else(|| self.default_model.clone())
    }

    /// Runs one call through the full retry/cache/persist pipeline and
    /// returns the accepted completion alongside the persisted request id.
    #[instrument(skip(self, messages, options), fields(model), err)]
    async fn run_call(
        &self,
        messages: Vec<LlmMessageRecord>,
        model: String,
        temperature: f32,
        max_output_tokens: u32,
        schema_id: Option<&str>,
        options: &LlmCallOptions,
    ) -> Result<(ProviderCompletion, LlmRequestId, bool), LlmError> {
        tracing::Span::current().record("model", model.as_str());

        if messages.is_empty() {
            return Err(LlmError::Validation("messages must be non-empty".into()));
        }

        if schema_id.is_none() && temperature <= CACHE_TEMP_THRESHOLD {
            if let Some(cache) = &self.cache {
                let key = CacheKey::compute(&messages, &model, temperature, max_output_tokens, schema_id);
                if let Some(hit) = cache.get(key) {
                    let mut request = LlmRequest::new_pending(
                        self.provider.name(),
                        model.clone(),
                        "chat",
                        messages,
                        serde_json::json!({}),
                        Some(temperature),
                        Some(max_output_tokens),
                    );
                    request.user_id = options.user_id.clone();
                    request.complete(hit.raw.clone(), hit.content.clone(), hit.input_tokens, hit.output_tokens, 0.0, 0, true);
                    let id = request.id;
                    self.store.insert_llm_request(&request).await.map_err(|e| LlmError::Transport(e.to_string()))?;
                    return Ok((hit, id, true));
                }
            }
        }

        let mut request = LlmRequest::new_pending(
            self.provider.name(),
            model.clone(),
            "chat",
            messages.clone(),
            serde_json::json!({ "model": model, "temperature": temperature, "max_output_tokens": max_output_tokens }),
            Some(temperature),
            Some(max_output_tokens),
        );
        request.user_id = options.user_id.clone();
        let request_id = request.id;
        self.store.insert_llm_request(&request).await.map_err(|e| LlmError::Transport(e.to_string()))?;

        let provider_request = ProviderRequest {
            messages,
            model: model.clone(),
            temperature,
            max_output_tokens,
            response_schema_name: schema_id.map(str::to_string),
        };

        let started = std::time::Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            request.retry_attempt = attempt;

            if let Some(token) = &options.cancellation {
                if token.is_cancelled() {
                    request.fail(crate::error::ErrorKind::Cancelled, "cancelled before attempt", started.elapsed().as_millis() as i64);
                    self.store.update_llm_request(&request).await.ok();
                    return Err(LlmError::Cancelled);
                }
            }

            let permit = self.concurrency.acquire().await.expect("semaphore not closed");
            let outcome = tokio::time::timeout(self.call_timeout, self.provider.complete(&provider_request)).await;
            drop(permit);

            let result = match outcome {
                Ok(inner) => inner,
                Err(_) => Err(LlmError::Timeout),
            };

            match result {
                Ok(completion) => {
                    let elapsed = started.elapsed().as_millis() as i64;
                    let cost = self.pricing.estimate(&model, completion.input_tokens, completion.output_tokens);
                    request.complete(completion.raw.clone(), completion.content.clone(), completion.input_tokens, completion.output_tokens, cost, elapsed, false);
                    request.provider_response_id = completion.provider_response_id.clone();
                    request.system_fingerprint = completion.system_fingerprint.clone();
                    self.store.update_llm_request(&request).await.map_err(|e| LlmError::Transport(e.to_string()))?;

                    if schema_id.is_none() && temperature <= CACHE_TEMP_THRESHOLD {
                        if let Some(cache) = &self.cache {
                            let key = CacheKey::compute(&provider_request.messages, &model, temperature, max_output_tokens, schema_id);
                            cache.put(key, completion.clone());
                        }
                    }
                    return Ok((completion, request_id, false));
                }
                Err(error) => {
                    let kind = error.classify();
                    let elapsed = started.elapsed().as_millis() as i64;
                    if kind.is_retryable() && attempt < self.max_retries {
                        let backoff_ms = 50u64 * 2u64.pow(attempt.min(6)) + rand::rng().random_range(0..50);
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        continue;
                    }
                    request.fail(kind, error.to_string(), elapsed);
                    self.store.update_llm_request(&request).await.map_err(|e| LlmError::Transport(e.to_string()))?;
                    return Err(error);
                }
            }
        }
    }

    #[instrument(skip(self, messages, options), err)]
    pub async fn generate_response(
        &self,
        messages: Vec<LlmMessageRecord>,
        options: LlmCallOptions,
    ) -> Result<(GatewayResponse, LlmRequestId), LlmError> {
        let model = self.resolve_model(options.model.clone());
        let temperature = options.temperature.unwrap_or(0.7);
        let max_output_tokens = options.max_output_tokens.unwrap_or(1024);
        let started = std::time::Instant::now();

        let (completion, request_id, cached) = self
            .run_call(messages, model.clone(), temperature, max_output_tokens, None, &options)
            .await?;

        Ok((
            GatewayResponse {
                content: completion.content,
                model: model.clone(),
                provider: self.provider.name().to_string(),
                input_tokens: completion.input_tokens,
                output_tokens: completion.output_tokens,
                tokens_used: completion.input_tokens + completion.output_tokens,
                cost_estimate: self.pricing.estimate(&model, completion.input_tokens, completion.output_tokens),
                cached,
                response_time_ms: started.elapsed().as_millis() as i64,
                provider_response_id: completion.provider_response_id,
                system_fingerprint: completion.system_fingerprint,
            },
            request_id,
        ))
    }

    /// Structured completion: instructs the provider via `schema_id`, parses
    /// the result into `T`, and attempts one "repair" call on parse failure
    /// before surfacing `invalid_response` (`spec.md` §4.1, §4.2).
    pub async fn generate_structured<T>(
        &self,
        messages: Vec<LlmMessageRecord>,
        schema_id: &'static str,
        options: LlmCallOptions,
    ) -> Result<(T, LlmRequestId, GatewayUsage), LlmError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let model = self.resolve_model(options.model.clone());
        let temperature = options.temperature.unwrap_or(0.0);
        let max_output_tokens = options.max_output_tokens.unwrap_or(1024);

        let (completion, request_id, _cached) = self
            .run_call(messages.clone(), model.clone(), temperature, max_output_tokens, Some(schema_id), &options)
            .await?;

        match serde_json::from_str::<T>(&completion.content) {
            Ok(value) => Ok((
                value,
                request_id,
                GatewayUsage {
                    input_tokens: completion.input_tokens,
                    output_tokens: completion.output_tokens,
                    tokens_used: completion.input_tokens + completion.output_tokens,
                    cost_estimate: self.pricing.estimate(&model, completion.input_tokens, completion.output_tokens),
                },
            )),
            Err(parse_error) => {
                let mut repair_messages = messages;
                repair_messages.push(LlmMessageRecord::text(
                    "user",
                    format!(
                        "Your previous response did not parse as the required JSON shape ({parse_error}). \
                         Reply again with only valid JSON matching that shape."
                    ),
                ));
                let (repaired, _repair_request_id, _cached) = self
                    .run_call(repair_messages, model.clone(), temperature, max_output_tokens, Some(schema_id), &options)
                    .await?;
                serde_json::from_str::<T>(&repaired.content)
                    .map(|value| {
                        (
                            value,
                            request_id,
                            GatewayUsage {
                                input_tokens: completion.input_tokens + repaired.input_tokens,
                                output_tokens: completion.output_tokens + repaired.output_tokens,
                                tokens_used: completion.input_tokens
                                    + completion.output_tokens
                                    + repaired.input_tokens
                                    + repaired.output_tokens,
                                cost_estimate: self.pricing.estimate(&model, completion.input_tokens, completion.output_tokens)
                                    + self.pricing.estimate(&model, repaired.input_tokens, repaired.output_tokens),
                            },
                        )
                    })
                    .map_err(|e| LlmError::InvalidResponse(e.to_string()))
            }
        }
    }

    pub async fn generate_audio(
        &self,
        text: &str,
        voice: &str,
        options: LlmCallOptions,
    ) -> Result<(GatewayAudio, LlmRequestId), LlmError> {
        let model = self.resolve_model(options.model.clone());
        let mut request = LlmRequest::new_pending(
            self.provider.name(),
            model.clone(),
            "audio",
            vec![LlmMessageRecord::text("user", text)],
            serde_json::json!({ "voice": voice }),
            None,
            None,
        );
        request.user_id = options.user_id.clone();
        let request_id = request.id;
        self.store.insert_llm_request(&request).await.map_err(|e| LlmError::Transport(e.to_string()))?;

        let started = std::time::Instant::now();
        let permit = self.concurrency.acquire().await.expect("semaphore not closed");
        let outcome = self.provider.generate_audio(text, voice, &model, "mp3", 1.0).await;
        drop(permit);
        let elapsed = started.elapsed().as_millis() as i64;

        match outcome {
            Ok(audio) => {
                request.complete(serde_json::json!({ "duration_seconds": audio.duration_seconds }), String::new(), 0, 0, 0.0, elapsed, false);
                self.store.update_llm_request(&request).await.map_err(|e| LlmError::Transport(e.to_string()))?;
                Ok((GatewayAudio { bytes: audio.bytes, duration_seconds: audio.duration_seconds }, request_id))
            }
            Err(error) => {
                request.fail(error.classify(), error.to_string(), elapsed);
                self.store.update_llm_request(&request).await.map_err(|e| LlmError::Transport(e.to_string()))?;
                Err(error)
            }
        }
    }

    pub async fn generate_image(
        &self,
        prompt: &str,
        size: &str,
        quality: Option<&str>,
        style: Option<&str>,
    ) -> Result<(GatewayImage, LlmRequestId), LlmError> {
        let model = self.resolve_model(None);
        let mut request = LlmRequest::new_pending(
            self.provider.name(),
            model.clone(),
            "image",
            vec![LlmMessageRecord::text("user", prompt)],
            serde_json::json!({ "size": size, "quality": quality, "style": style }),
            None,
            None,
        );
        let request_id = request.id;
        self.store.insert_llm_request(&request).await.map_err(|e| LlmError::Transport(e.to_string()))?;

        let started = std::time::Instant::now();
        let permit = self.concurrency.acquire().await.expect("semaphore not closed");
        let outcome = self.provider.generate_image(prompt, size, quality, style).await;
        drop(permit);
        let elapsed = started.elapsed().as_millis() as i64;

        match outcome {
            Ok(image) => {
                let payload_json = match &image.payload {
                    ImagePayload::Url(url) => serde_json::json!({ "url": url }),
                    ImagePayload::Bytes(bytes) => serde_json::json!({ "bytes_len": bytes.len() }),
                };
                request.complete(payload_json, String::new(), 0, 0, 0.0, elapsed, false);
                self.store.update_llm_request(&request).await.map_err(|e| LlmError::Transport(e.to_string()))?;
                Ok((GatewayImage { payload: image.payload, revised_prompt: image.revised_prompt }, request_id))
            }
            Err(error) => {
                request.fail(error.classify(), error.to_string(), elapsed);
                self.store.update_llm_request(&request).await.map_err(|e| LlmError::Transport(e.to_string()))?;
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock_provider::MockProvider;
    use crate::store::InMemoryStore;

    fn gateway() -> (LlmGateway, Arc<MockProvider>) {
        let config = Config::for_tests();
        let provider = Arc::new(MockProvider::new());
        let gw = LlmGateway::new(SharedProvider(provider.clone()), Arc::new(InMemoryStore::new()), &config);
        (gw, provider)
    }

    /// Wraps a shared `Arc<MockProvider>` so the test can keep scripting it
    /// after handing a copy to the gateway.
    struct SharedProvider(Arc<MockProvider>);

    #[async_trait::async_trait]
    impl LlmProvider for SharedProvider {
        fn name(&self) -> &'static str {
            self.0.name()
        }
        async fn complete(&self, request: &ProviderRequest) -> Result<ProviderCompletion, LlmError> {
            self.0.complete(request).await
        }
        async fn generate_audio(&self, text: &str, voice: &str, model: &str, audio_format: &str, speed: f32) -> Result<super::super::provider::ProviderAudio, LlmError> {
            self.0.generate_audio(text, voice, model, audio_format, speed).await
        }
        async fn generate_image(&self, prompt: &str, size: &str, quality: Option<&str>, style: Option<&str>) -> Result<super::super::provider::ProviderImage, LlmError> {
            self.0.generate_image(prompt, size, quality, style).await
        }
    }

    #[tokio::test]
    async fn generate_response_persists_a_completed_request() {
        let (gw, _provider) = gateway();
        let (response, request_id) = gw
            .generate_response(vec![LlmMessageRecord::text("user", "hello")], LlmCallOptions::default())
            .await
            .unwrap();
        assert!(!response.content.is_empty());
        assert_eq!(response.tokens_used, response.input_tokens + response.output_tokens);
        let stored = gw.store.get_llm_request(request_id).await.unwrap();
        assert!(stored.is_well_formed());
    }

    #[tokio::test]
    async fn empty_messages_is_a_validation_error() {
        let (gw, _provider) = gateway();
        let err = gw.generate_response(vec![], LlmCallOptions::default()).await.unwrap_err();
        assert!(matches!(err, LlmError::Validation(_)));
    }

    #[tokio::test]
    async fn retryable_failure_is_retried_then_succeeds() {
        let (gw, provider) = gateway();
        provider.push_failure(LlmError::RateLimited);
        provider.push_completion(r#"{"echo":"ok"}"#);
        let (response, _id) = gw
            .generate_response(vec![LlmMessageRecord::text("user", "hello")], LlmCallOptions::default())
            .await
            .unwrap();
        assert!(response.content.contains("ok"));
    }

    #[tokio::test]
    async fn validation_error_is_never_retried() {
        let (gw, provider) = gateway();
        provider.push_failure(LlmError::Validation("bad schema".into()));
        let err = gw
            .generate_response(vec![LlmMessageRecord::text("user", "hello")], LlmCallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Validation(_)));
        assert_eq!(provider.call_count(), 1);
    }

    #[derive(serde::Deserialize, serde::Serialize)]
    struct Greeting {
        text: String,
    }

    #[tokio::test]
    async fn generate_structured_parses_valid_json() {
        let (gw, provider) = gateway();
        provider.push_completion(r#"{"text":"hi"}"#);
        let (value, _id, usage) = gw
            .generate_structured::<Greeting>(vec![LlmMessageRecord::text("user", "greet")], "Greeting", LlmCallOptions::default())
            .await
            .unwrap();
        assert_eq!(value.text, "hi");
        assert!(usage.tokens_used > 0);
    }

    #[tokio::test]
    async fn generate_structured_repairs_once_on_parse_failure() {
        let (gw, provider) = gateway();
        provider.push_completion("not json");
        provider.push_completion(r#"{"text":"recovered"}"#);
        let (value, _id, _usage) = gw
            .generate_structured::<Greeting>(vec![LlmMessageRecord::text("user", "greet")], "Greeting", LlmCallOptions::default())
            .await
            .unwrap();
        assert_eq!(value.text, "recovered");
    }

    #[tokio::test]
    async fn generate_structured_surfaces_invalid_response_after_failed_repair() {
        let (gw, provider) = gateway();
        provider.push_completion("not json");
        provider.push_completion("still not json");
        let err = gw
            .generate_structured::<Greeting>(vec![LlmMessageRecord::text("user", "greet")], "Greeting", LlmCallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }
}
