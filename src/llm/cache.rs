//! Response cache (`spec.md` §4.1, §9 open question resolved in
//! `SPEC_FULL.md` §4.1): applies only to non-media calls at or below
//! [`CACHE_TEMP_THRESHOLD`], keyed by the canonical hash of
//! `(messages, model, temperature, max_output_tokens, schema_id)`.

use std::hash::{Hash, Hasher};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHasher};

use super::provider::ProviderCompletion;
use crate::domain::LlmMessageRecord;

/// Calls above this temperature are never cached — they're expected to vary
/// run to run, so a cache hit would silently defeat the caller's intent.
pub const CACHE_TEMP_THRESHOLD: f32 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    #[must_use]
    pub fn compute(
        messages: &[LlmMessageRecord],
        model: &str,
        temperature: f32,
        max_output_tokens: u32,
        schema_id: Option<&str>,
    ) -> Self {
        let mut hasher = FxHasher::default();
        for message in messages {
            message.role.hash(&mut hasher);
            // Hash the canonical JSON text rather than the raw struct so
            // embedded source material is folded into one stable digest
            // instead of carried verbatim into the key.
            serde_json::to_string(&message.content).unwrap_or_default().hash(&mut hasher);
        }
        model.hash(&mut hasher);
        temperature.to_bits().hash(&mut hasher);
        max_output_tokens.hash(&mut hasher);
        schema_id.unwrap_or_default().hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Process-local or out-of-process key/value cache for provider completions.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: CacheKey) -> Option<ProviderCompletion>;
    fn put(&self, key: CacheKey, value: ProviderCompletion);
}

#[derive(Default)]
pub struct InMemoryResponseCache {
    entries: Mutex<FxHashMap<CacheKey, ProviderCompletion>>,
}

impl InMemoryResponseCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseCache for InMemoryResponseCache {
    fn get(&self, key: CacheKey) -> Option<ProviderCompletion> {
        self.entries.lock().get(&key).cloned()
    }

    fn put(&self, key: CacheKey, value: ProviderCompletion) {
        self.entries.lock().insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_produce_identical_keys() {
        let messages = vec![LlmMessageRecord::text("user", "hello")];
        let a = CacheKey::compute(&messages, "gpt-4o-mini", 0.0, 256, None);
        let b = CacheKey::compute(&messages, "gpt-4o-mini", 0.0, 256, None);
        assert_eq!(a, b);
    }

    #[test]
    fn different_model_produces_different_key() {
        let messages = vec![LlmMessageRecord::text("user", "hello")];
        let a = CacheKey::compute(&messages, "gpt-4o-mini", 0.0, 256, None);
        let b = CacheKey::compute(&messages, "gpt-4o", 0.0, 256, None);
        assert_ne!(a, b);
    }
}
