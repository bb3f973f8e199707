//! Task API Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    Json,
};
use racs_core::dto::task::TaskInfo;
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::repository::task_repository;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub from: i64,
}

/// GET /task/list?from=N
///
/// Newest-first page of the task history.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<TaskInfo>>> {
    let tasks = task_repository::list(&state.pool, query.from).await?;
    Ok(Json(tasks.iter().map(TaskInfo::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub offset: usize,
}

/// GET /task/{id}/logs?offset=N
///
/// Log bytes from the given offset; the task state is carried in the
/// X-Task-State header so pollers know when to stop.
pub async fn logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<(HeaderMap, Vec<u8>)> {
    let task_state = task_repository::state_of(&state.pool, id)
        .await?
        .ok_or(ApiError::TaskNotFound(id))?;

    let bytes = tokio::fs::read(state.layout.task_log(id))
        .await
        .unwrap_or_default();
    let tail = bytes.get(query.offset..).unwrap_or_default().to_vec();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain"),
    );
    if let Ok(value) = HeaderValue::from_str(&task_state) {
        headers.insert("X-Task-State", value);
    }
    Ok((headers, tail))
}
