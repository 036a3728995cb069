//! Unified error handling for Toolhub Core

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No valid, active principal behind the request
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated principal lacks the role or permission
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("System role '{0}' cannot be deleted or renamed")]
    SystemRoleProtected(String),

    #[error("Role '{role}' is still assigned to {assigned} principal(s)")]
    RoleInUse { role: String, assigned: i64 },

    /// A module or binding references a permission the catalog does not know
    #[error("Configuration invalid: {0}")]
    ConfigurationInvalid(String),

    /// The backing store timed out or refused the call
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None)
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone(), None)
            }
            AppError::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "You do not have access to this resource".to_string(),
                None,
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            AppError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation",
                msg.clone(),
                None,
            ),
            AppError::SystemRoleProtected(_) => (
                StatusCode::CONFLICT,
                "system_role_protected",
                self.to_string(),
                None,
            ),
            AppError::RoleInUse { assigned, .. } => (
                StatusCode::CONFLICT,
                "role_in_use",
                self.to_string(),
                Some(serde_json::json!({ "assigned": assigned })),
            ),
            AppError::ConfigurationInvalid(msg) => {
                tracing::warn!(event = "authz_config_invalid", "{}", msg);
                (
                    StatusCode::FORBIDDEN,
                    "forbidden",
                    "You do not have access to this resource".to_string(),
                    None,
                )
            }
            AppError::StoreUnavailable(msg) => {
                tracing::error!("Store unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    "Service temporarily unavailable".to_string(),
                    None,
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred".to_string(),
                    None,
                )
            }
            AppError::Jwt(e) => {
                tracing::debug!("JWT error: {:?}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    "jwt_error",
                    "Invalid or expired token".to_string(),
                    None,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

// Conversion from validation errors
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}
