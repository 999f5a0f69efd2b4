//! LLM gateway: the sole path through which every model call passes
//! (`spec.md` §4.1).

pub mod cache;
pub mod error;
pub mod gateway;
pub mod mock_provider;
pub mod pricing;
pub mod provider;

pub use cache::{CacheKey, InMemoryResponseCache, ResponseCache, CACHE_TEMP_THRESHOLD};
pub use error::LlmError;
pub use gateway::{GatewayAudio, GatewayImage, GatewayResponse, GatewayUsage, LlmCallOptions, LlmGateway};
pub use mock_provider::MockProvider;
pub use pricing::{ModelRate, PricingTable};
pub use provider::{ImagePayload, LlmProvider, ProviderAudio, ProviderCompletion, ProviderImage, ProviderRequest};
