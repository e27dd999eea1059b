//! Unified API error handling
//!
//! This module provides a consistent error response format across all API endpoints.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbError;
use crate::service::classification::ClassificationError;
use crate::service::template::TemplateServiceError;
use crate::service::ticket::TicketServiceError;

/// Standard error response format
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique request ID for tracing
    pub request_id: String,
}

/// Unified API error type
///
/// All API endpoints return `Result<T, ApiError>` for consistent error handling.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request / validation error (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource already exists (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(String),
}

impl ApiError {
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal_error",
            ApiError::Database(_) => "database_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_type = self.error_type();

        if status.is_server_error() {
            tracing::error!(
                error_type = error_type,
                status = status.as_u16(),
                message = %self,
                "API error"
            );
        } else {
            tracing::debug!(
                error_type = error_type,
                status = status.as_u16(),
                message = %self,
                "API request rejected"
            );
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            request_id: Uuid::new_v4().to_string(),
        })
    }
}

// ============================================================================
// From conversions for service errors
// ============================================================================

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(id) => ApiError::NotFound(id),
            DbError::Conflict(id) => ApiError::Conflict(id),
            _ => ApiError::Database(err.to_string()),
        }
    }
}

impl From<ClassificationError> for ApiError {
    fn from(err: ClassificationError) -> Self {
        match err {
            ClassificationError::Input(e) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<TicketServiceError> for ApiError {
    fn from(err: TicketServiceError) -> Self {
        match err {
            TicketServiceError::Classification(e) => e.into(),
            TicketServiceError::DbError(e) => e.into(),
        }
    }
}

impl From<TemplateServiceError> for ApiError {
    fn from(err: TemplateServiceError) -> Self {
        match err {
            TemplateServiceError::Invalid(msg) => ApiError::BadRequest(msg),
            TemplateServiceError::DbError(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::classification::InputError;

    #[test]
    fn test_input_error_maps_to_bad_request() {
        let err: ApiError = TicketServiceError::Classification(ClassificationError::Input(
            InputError::TooShort(3),
        ))
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("at least 10 characters"));
    }

    #[test]
    fn test_db_errors_map_to_status() {
        let not_found: ApiError = DbError::NotFound("ticket 9".to_string()).into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let conflict: ApiError =
            TemplateServiceError::DbError(DbError::Conflict("prompt template v1".to_string())).into();
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let storage: ApiError = DbError::Serialization("bad row".to_string()).into();
        assert_eq!(storage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_body_shape() {
        let response = ApiError::NotFound("ticket 1".to_string()).error_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
