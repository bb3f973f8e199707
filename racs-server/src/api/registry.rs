//! Registry API Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use racs_core::dto::registry::{RegistryFields, RegistryInfo};

use crate::api::error::{ApiError, ApiResult};
use crate::api::require_admin;
use crate::runtime;
use crate::state::AppState;

/// GET /registry/list
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<RegistryInfo>> {
    let registries: Vec<_> = state.registries.read().await.values().cloned().collect();
    let mut result = Vec::with_capacity(registries.len());
    for registry in registries {
        result.push(RegistryInfo::from(&*registry.read().await));
    }
    result.sort_by_key(|info| info.id);
    Json(result)
}

/// POST /registry/create
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RegistryFields>,
) -> ApiResult<(StatusCode, Json<i64>)> {
    require_admin(&state, &headers)?;
    let id = runtime::create_registry(&state, req).await?;
    Ok((StatusCode::CREATED, Json(id)))
}

/// POST /registry/{id}/update
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<RegistryFields>,
) -> ApiResult<&'static str> {
    require_admin(&state, &headers)?;
    if !runtime::update_registry(&state, id, req).await? {
        return Err(ApiError::RegistryNotFound(id));
    }
    Ok("OK")
}
