//! Credential API Handlers
//!
//! Credential values never appear in any response; listings carry only
//! ids and descriptions.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use racs_core::dto::credential::{CreateCredential, CredentialInfo, UpdateCredential};

use crate::api::error::{ApiError, ApiResult};
use crate::api::require_admin;
use crate::runtime;
use crate::state::AppState;

/// GET /credential/list
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<CredentialInfo>> {
    let mut result: Vec<CredentialInfo> = state
        .credentials
        .read()
        .await
        .values()
        .map(CredentialInfo::from)
        .collect();
    result.sort_by(|a, b| a.description.cmp(&b.description));
    Json(result)
}

/// POST /credential/create
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateCredential>,
) -> ApiResult<(StatusCode, Json<i64>)> {
    require_admin(&state, &headers)?;
    let id = runtime::create_credential(&state, req).await?;
    Ok((StatusCode::CREATED, Json(id)))
}

/// POST /credential/{id}/update
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<UpdateCredential>,
) -> ApiResult<&'static str> {
    require_admin(&state, &headers)?;
    if !runtime::update_credential(&state, id, req.value).await? {
        return Err(ApiError::CredentialNotFound(id));
    }
    Ok("OK")
}
