//! A thin `axum` router over the core: job submission and the admin read
//! model (`spec.md` §6). Feature-gated (`http`) since the core itself has no
//! HTTP dependency — this is a demonstration surface, not the product.

mod dto;
mod error;
mod routes;

pub use dto::{CreateUnitAccepted, CreateUnitBody, CreateUnitResponse, PageQuery};
pub use error::ApiError;
pub use routes::{build_router, AppState};
