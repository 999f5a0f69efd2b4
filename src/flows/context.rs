//! Named, shared scratch space one flow's steps pass data through.
//!
//! Steps are typed at their own boundary (`Step::Inputs`/`Outputs`); a flow
//! body reads a prior step's output back out of [`FlowContext`] by name and
//! deserializes it into the next step's input type. This mirrors the
//! teacher's own `VersionedState` map of named channels, narrowed to a flow
//! run's lifetime instead of a graph superstep.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use rustc_hash::FxHashMap;

#[derive(Default)]
pub struct FlowContext {
    values: RwLock<FxHashMap<String, serde_json::Value>>,
}

impl FlowContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set<T: Serialize>(&self, key: impl Into<String>, value: &T) {
        let encoded = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.values.write().await.insert(key.into(), encoded);
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let guard = self.values.read().await;
        let value = guard.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.values.read().await.contains_key(key)
    }

    pub async fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(&*self.values.read().await).unwrap_or(serde_json::Value::Null)
    }
}
