//! Project API Handlers
//!
//! HTTP endpoints for project lifecycle, configuration and webhooks.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use racs_core::dto::project::{
    CreateProject, DeleteProject, ProjectInfo, UpdateDestinations, UpdateEnvironment,
    UpdateProject, UpdateTriggers, UploadFile,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::{authorized, require_admin};
use crate::layout::clean_relative;
use crate::runtime::{self, RequestOutcome};
use crate::state::AppState;

/// GET /project/list
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<ProjectInfo>> {
    Json(state.project_list().await)
}

/// POST /project/create
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateProject>,
) -> ApiResult<(StatusCode, Json<i64>)> {
    require_admin(&state, &headers)?;
    let id = runtime::create_project(&state, &req).await?;
    Ok((StatusCode::CREATED, Json(id)))
}

/// GET /project/{id}/status
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProjectInfo>> {
    let handle = state
        .project(id)
        .await
        .ok_or(ApiError::ProjectNotFound(id))?;
    let project = handle.project.read().await.clone();
    Ok(Json(state.project_info(&project).await))
}

/// POST /project/{id}/update
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<UpdateProject>,
) -> ApiResult<&'static str> {
    require_admin(&state, &headers)?;
    if !runtime::update_project(&state, id, req).await? {
        return Err(ApiError::ProjectNotFound(id));
    }
    Ok("OK")
}

/// POST /project/{id}/destinations
pub async fn destinations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<UpdateDestinations>,
) -> ApiResult<&'static str> {
    require_admin(&state, &headers)?;
    if !runtime::set_destinations(&state, id, req.destinations).await? {
        return Err(ApiError::ProjectNotFound(id));
    }
    Ok("OK")
}

/// POST /project/{id}/triggers
pub async fn triggers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<UpdateTriggers>,
) -> ApiResult<&'static str> {
    require_admin(&state, &headers)?;
    if !runtime::set_triggers(&state, id, req.triggers).await? {
        return Err(ApiError::ProjectNotFound(id));
    }
    Ok("OK")
}

/// POST /project/{id}/environment
pub async fn environment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<UpdateEnvironment>,
) -> ApiResult<&'static str> {
    require_admin(&state, &headers)?;
    if !runtime::set_environment(&state, id, req.environment).await? {
        return Err(ApiError::ProjectNotFound(id));
    }
    Ok("OK")
}

/// POST /project/{id}/upload
///
/// Stages a recipe file into the project's root.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<UploadFile>,
) -> ApiResult<&'static str> {
    require_admin(&state, &headers)?;
    if state.project(id).await.is_none() {
        return Err(ApiError::ProjectNotFound(id));
    }
    let name = clean_relative(&req.name)
        .ok_or_else(|| ApiError::InvalidRecipeName(req.name.clone()))?;
    let path = state.layout.recipe_path(id, &name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, req.value)?;
    tracing::info!("Stored recipe {} for project {}", name, id);
    Ok("OK")
}

/// POST /project/{id}/build/{stage}
///
/// The webhook: requests a stage run. Protected projects reject
/// unauthenticated callers; a payload whose `ref` does not match the
/// project branch is acknowledged but ignored, as are unknown stages.
pub async fn build(
    State(state): State<Arc<AppState>>,
    Path((id, stage)): Path<(i64, String)>,
    headers: HeaderMap,
    payload: Option<Json<serde_json::Value>>,
) -> ApiResult<&'static str> {
    let authenticated = authorized(&state, &headers);
    let payload = payload.as_ref().map(|Json(value)| value);
    match runtime::request_stage(&state, id, &stage, payload, authenticated).await {
        RequestOutcome::Queued | RequestOutcome::Ignored => Ok("OK"),
        RequestOutcome::Rejected => Err(ApiError::Unauthorized),
        RequestOutcome::NotFound => Err(ApiError::ProjectNotFound(id)),
    }
}

/// POST /project/{id}/delete
///
/// Enqueues the delete stage; it is processed in queue order behind any
/// already-queued work.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<DeleteProject>,
) -> ApiResult<&'static str> {
    require_admin(&state, &headers)?;
    if req.confirm != "YES" {
        return Err(ApiError::DeleteNotConfirmed);
    }
    if !runtime::enqueue_delete(&state, id).await {
        return Err(ApiError::ProjectNotFound(id));
    }
    Ok("OK")
}
