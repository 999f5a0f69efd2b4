//! Thin `axum` router over [`crate::jobs::JobManager`] and
//! [`crate::admin::AdminReadModel`] — the routes table of `spec.md` §6.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::admin::AdminReadModel;
use crate::domain::{Lesson, Unit};
use crate::ids::{FlowRunId, FlowStepRunId, LessonId, LlmRequestId, UnitId};
use crate::jobs::JobManager;
use crate::store::{Store, StoreError};

use super::dto::{CreateUnitBody, CreateUnitResponse, PageQuery};
use super::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jobs: Arc<JobManager>,
    pub admin: Arc<AdminReadModel>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, jobs: Arc<JobManager>, admin: Arc<AdminReadModel>) -> Self {
        Self { store, jobs, admin }
    }
}

#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/units", post(create_unit))
        .route("/api/v1/units/:unit_id", get(get_unit))
        .route("/api/v1/units/:unit_id/lessons/:lesson_id", get(get_lesson))
        .route("/api/v1/admin/flows", get(list_flows))
        .route("/api/v1/admin/flows/:flow_run_id", get(get_flow))
        .route("/api/v1/admin/flows/:flow_run_id/steps/:step_run_id", get(get_flow_step))
        .route("/api/v1/admin/llm-requests/:request_id", get(get_llm_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn create_unit(State(state): State<AppState>, Json(body): Json<CreateUnitBody>) -> Result<Response, ApiError> {
    let background = body.background;
    let request = body.into_request(None)?;
    let outcome = state.jobs.submit(request, background).await?;
    Ok(match CreateUnitResponse::from(outcome) {
        CreateUnitResponse::Accepted(accepted) => (StatusCode::ACCEPTED, Json(accepted)).into_response(),
        CreateUnitResponse::Completed(unit) => (StatusCode::OK, Json(unit)).into_response(),
    })
}

async fn get_unit(State(state): State<AppState>, Path(unit_id): Path<UnitId>) -> Result<Json<Unit>, ApiError> {
    Ok(Json(state.store.get_unit(unit_id).await?))
}

async fn get_lesson(State(state): State<AppState>, Path((unit_id, lesson_id)): Path<(UnitId, LessonId)>) -> Result<Json<Lesson>, ApiError> {
    let lesson = state.store.get_lesson(lesson_id).await?;
    if lesson.unit_id != unit_id {
        return Err(StoreError::NotFound { kind: "lesson", id: lesson_id.to_string() }.into());
    }
    Ok(Json(lesson))
}

async fn list_flows(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<crate::admin::FlowRunListPage>, ApiError> {
    Ok(Json(state.admin.list_flow_runs(query.page, query.page_size).await?))
}

async fn get_flow(State(state): State<AppState>, Path(flow_run_id): Path<FlowRunId>) -> Result<Json<crate::admin::FlowRunDetail>, ApiError> {
    Ok(Json(state.admin.get_flow_run_detail(flow_run_id).await?))
}

async fn get_flow_step(
    State(state): State<AppState>,
    Path((flow_run_id, step_run_id)): Path<(FlowRunId, FlowStepRunId)>,
) -> Result<Json<crate::domain::FlowStepRun>, ApiError> {
    Ok(Json(state.admin.get_flow_step_run(flow_run_id, step_run_id).await?))
}

async fn get_llm_request(
    State(state): State<AppState>,
    Path(request_id): Path<LlmRequestId>,
) -> Result<Json<crate::domain::LlmRequest>, ApiError> {
    Ok(Json(state.admin.get_llm_request(request_id).await?))
}
