//! API Module
//!
//! HTTP surface for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod credential;
pub mod error;
pub mod events;
pub mod project;
pub mod registry;
pub mod task;

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::api::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Create the main API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Event stream
        .route("/events", get(events::stream))
        // Project endpoints
        .route("/project/list", get(project::list))
        .route("/project/create", post(project::create))
        .route("/project/{id}/status", get(project::status))
        .route("/project/{id}/update", post(project::update))
        .route("/project/{id}/destinations", post(project::destinations))
        .route("/project/{id}/triggers", post(project::triggers))
        .route("/project/{id}/environment", post(project::environment))
        .route("/project/{id}/upload", post(project::upload))
        .route("/project/{id}/build/{stage}", post(project::build))
        .route("/project/{id}/delete", post(project::delete))
        // Task endpoints
        .route("/task/list", get(task::list))
        .route("/task/{id}/logs", get(task::logs))
        // Registry endpoints
        .route("/registry/list", get(registry::list))
        .route("/registry/create", post(registry::create))
        .route("/registry/{id}/update", post(registry::update))
        // Credential endpoints
        .route("/credential/list", get(credential::list))
        .route("/credential/create", post(credential::create))
        .route("/credential/{id}/update", post(credential::update))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}

/// Whether the request carries an acceptable identity: either the
/// server runs with `--no-login`, or the configured admin token is
/// presented as a bearer token.
pub fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
    if state.config.no_login {
        return true;
    }
    let Some(token) = &state.config.admin_token else {
        return false;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|presented| presented == token)
        .unwrap_or(false)
}

/// Guards the mutating admin endpoints
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    if authorized(state, headers) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}
