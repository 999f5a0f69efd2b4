//! The unit of work a flow drives: one bounded operation over typed
//! inputs/outputs, usually backed by a single [`crate::llm::LlmGateway`]
//! call (`spec.md` §4.2).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::context::StepContext;
use super::error::StepError;

#[async_trait]
pub trait Step: Send + Sync {
    type Inputs: Serialize + DeserializeOwned + Send + Sync + 'static;
    type Outputs: Serialize + DeserializeOwned + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    async fn execute(&self, inputs: &Self::Inputs, ctx: &StepContext) -> Result<Self::Outputs, StepError>;

    /// Domain-invariant check on inputs beyond what deserialization already
    /// guarantees. Default accepts everything.
    fn validate_inputs(&self, _inputs: &Self::Inputs) -> Result<(), String> {
        Ok(())
    }

    /// Domain-invariant check on a successful call's outputs. A failure here
    /// costs the step exactly one repair attempt before it is failed
    /// (`spec.md` §4.2).
    fn validate_outputs(&self, _outputs: &Self::Outputs) -> Result<(), String> {
        Ok(())
    }
}
