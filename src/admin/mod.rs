//! Read-only operational views over flow runs, steps, and LLM requests
//! (`spec.md` §4.6). Nothing here writes; it exists so an implementer can
//! render an admin page or endpoint without joining across modules itself.

mod error;
mod read_model;

pub use error::AdminError;
pub use read_model::{AdminReadModel, FlowRunDetail, FlowRunListPage, FlowRunSummary};
