//! API error types
//!
//! Typed errors for the HTTP surface, mapped onto status codes. Entity
//! lookups carry the id that missed; store and filesystem failures are
//! logged server-side and collapsed into an opaque 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Result type alias for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors surfaced by the HTTP layer
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Project {0} not found")]
    ProjectNotFound(i64),

    #[error("Registry {0} not found")]
    RegistryNotFound(i64),

    #[error("Credential {0} not found")]
    CredentialNotFound(i64),

    #[error("Task {0} not found")]
    TaskNotFound(i64),

    /// The supplied recipe name would escape the project root
    #[error("Invalid recipe name: {0}")]
    InvalidRecipeName(String),

    /// Project deletion without the confirmation token
    #[error("Deletion requires confirm=YES")]
    DeleteNotConfirmed,

    /// Caller lacks the admin identity
    #[error("Unauthorized")]
    Unauthorized,

    /// Durable store failure
    #[error("Store failure: {0}")]
    Store(#[from] sqlx::Error),

    /// Recipe file could not be stored
    #[error("File failure: {0}")]
    File(#[from] std::io::Error),

    /// Anything else bubbling out of the runtime
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::ProjectNotFound(_)
            | ApiError::RegistryNotFound(_)
            | ApiError::CredentialNotFound(_)
            | ApiError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRecipeName(_) | ApiError::DeleteNotConfirmed => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized => StatusCode::FORBIDDEN,
            ApiError::Store(err) => {
                tracing::error!("Store failure: {:?}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::File(err) => {
                tracing::error!("File failure: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Internal(err) => {
                tracing::error!("Request failed: {:#}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::ProjectNotFound(3).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::DeleteNotConfirmed.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom"))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages_carry_the_entity() {
        assert_eq!(ApiError::TaskNotFound(41).to_string(), "Task 41 not found");
        assert_eq!(
            ApiError::InvalidRecipeName("../etc".to_string()).to_string(),
            "Invalid recipe name: ../etc"
        );
    }
}
