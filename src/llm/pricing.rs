//! Advisory cost estimation (`spec.md` §4.1: "values are advisory, stored as
//! floats, and never used as a gate").

use rustc_hash::FxHashMap;

#[derive(Clone, Copy, Debug)]
pub struct ModelRate {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// Per-model USD/1k-token rates. Unknown models fall back to `default_rate`
/// rather than erroring — the estimate is advisory, a missing model should
/// never block a call.
pub struct PricingTable {
    rates: FxHashMap<String, ModelRate>,
    default_rate: ModelRate,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut rates = FxHashMap::default();
        rates.insert("gpt-4o-mini".to_string(), ModelRate { input_per_1k: 0.00015, output_per_1k: 0.0006 });
        rates.insert("gpt-4o".to_string(), ModelRate { input_per_1k: 0.0025, output_per_1k: 0.01 });
        rates.insert("mock-model".to_string(), ModelRate { input_per_1k: 0.0, output_per_1k: 0.0 });
        Self {
            rates,
            default_rate: ModelRate { input_per_1k: 0.001, output_per_1k: 0.002 },
        }
    }
}

impl PricingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: impl Into<String>, rate: ModelRate) {
        self.rates.insert(model.into(), rate);
    }

    #[must_use]
    pub fn estimate(&self, model: &str, input_tokens: i64, output_tokens: i64) -> f64 {
        let rate = self.rates.get(model).copied().unwrap_or(self.default_rate);
        (input_tokens as f64 / 1000.0) * rate.input_per_1k + (output_tokens as f64 / 1000.0) * rate.output_per_1k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_uses_its_own_rate() {
        let table = PricingTable::new();
        let cost = table.estimate("gpt-4o-mini", 1000, 1000);
        assert!((cost - 0.00075).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_falls_back_to_default_rate() {
        let table = PricingTable::new();
        let cost = table.estimate("unknown-model-xyz", 1000, 0);
        assert!((cost - 0.001).abs() < 1e-9);
    }
}
