//! # lessonforge: flow/step execution engine for generated learning content
//!
//! `lessonforge` runs the content pipeline that turns a topic or a source
//! document into a structured learning [`domain::Unit`] made of
//! [`domain::Lesson`]s: metadata extraction, didactic text, glossary,
//! exercises, and optional art/podcast media, all produced by calls through a
//! single [`llm::LlmGateway`] chokepoint.
//!
//! ## Module guide
//!
//! - [`domain`] — persisted aggregates (`FlowRun`, `FlowStepRun`, `LlmRequest`,
//!   `Unit`, `Lesson`) as plain serde/sqlx structs.
//! - [`llm`] — the gateway every model call passes through: retries, caching,
//!   cost accounting, request-log persistence.
//! - [`steps`] — the `Step` trait and the runtime that validates inputs,
//!   executes, validates outputs, and repairs once on failure.
//! - [`flows`] — the named-sequence runtime, flow context, fan-out
//!   combinator, and heartbeat.
//! - [`orchestrator`] — the concrete steps and flows that assemble a Unit.
//! - [`jobs`] — job submission and the stall reconciler.
//! - [`admin`] — read-only flow/step/request views for operational tooling.
//! - [`store`] — the persistence boundary and its in-memory/SQLite backends.
//! - [`objectstore`] — the BLOB storage boundary for generated media.
//! - [`http`] — a thin `axum` router wiring jobs and admin reads (feature `http`).

pub mod admin;
pub mod config;
pub mod domain;
pub mod error;
pub mod flows;
#[cfg(feature = "http")]
pub mod http;
pub mod ids;
pub mod jobs;
pub mod llm;
pub mod objectstore;
pub mod orchestrator;
pub mod steps;
pub mod store;
pub mod utils;

pub use error::{Classify, CoreError, ErrorKind};
