//! # Error Handling
//!
//! Unified error handling for the auth service: a problem+json [`ApiError`]
//! for the HTTP boundary, [`RepositoryError`] for storage failures and the
//! domain [`AuthError`] taxonomy every gateway operation returns.

use std::time::Duration;

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::telemetry;

/// Generic message for every credential or token failure.
pub const INVALID_CREDENTIALS: &str = "Incorrect email or password";
/// Generic message for every bearer-token failure.
pub const INVALID_TOKEN: &str = "Could not validate credentials";
/// Generic message for every refresh failure.
pub const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

/// Standard error types with predefined status codes
#[derive(Debug, Error)]
pub enum ErrorType {
    #[error("Bad Request")]
    BadRequest,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not Found")]
    NotFound,
    #[error("Unprocessable Entity")]
    UnprocessableEntity,
    #[error("Internal Server Error")]
    InternalServerError,
    #[error("Service Unavailable")]
    ServiceUnavailable,
}

impl ErrorType {
    /// Get the appropriate HTTP status code for this error type
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorType::BadRequest => StatusCode::BAD_REQUEST,
            ErrorType::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorType::Forbidden => StatusCode::FORBIDDEN,
            ErrorType::NotFound => StatusCode::NOT_FOUND,
            ErrorType::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorType::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error code string for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorType::BadRequest => "BAD_REQUEST",
            ErrorType::Unauthorized => "UNAUTHORIZED",
            ErrorType::Forbidden => "FORBIDDEN",
            ErrorType::NotFound => "NOT_FOUND",
            ErrorType::UnprocessableEntity => "VALIDATION_FAILED",
            ErrorType::InternalServerError => "INTERNAL_SERVER_ERROR",
            ErrorType::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        if self.status == StatusCode::UNAUTHORIZED {
            headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        if let Some(trace_id) = self.trace_id.as_deref()
            && let Ok(value) = HeaderValue::from_str(trace_id)
        {
            headers.insert("x-trace-id", value);
        }

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl ErrorType {
    /// Build an [`ApiError`] of this type with a caller-facing message.
    pub fn with_message(&self, message: impl Into<String>) -> ApiError {
        ApiError::new(self.status_code(), self.error_code(), message)
    }
}

impl From<ErrorType> for ApiError {
    fn from(error_type: ErrorType) -> Self {
        error_type.with_message(error_type.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", error);

        ErrorType::InternalServerError.with_message("An internal error occurred")
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err.body_text()),
            JsonRejection::JsonSyntaxError(err) => {
                format!("JSON syntax error: {}", err.body_text())
            }
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        ErrorType::UnprocessableEntity.with_message(message)
    }
}

/// Errors raised by the repository layer
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(DbErr),
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("storage call exceeded {0:?}")]
    Timeout(Duration),
}

impl RepositoryError {
    /// Classify a SeaORM error, separating unique violations from other failures.
    pub fn database_error(error: DbErr) -> Self {
        match error.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => Self::Conflict(detail),
            _ => Self::Database(error),
        }
    }

    pub fn validation_error(message: &str) -> Self {
        Self::Validation(message.to_string())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<DbErr> for RepositoryError {
    fn from(error: DbErr) -> Self {
        Self::database_error(error)
    }
}

/// Domain failures of the auth gateway.
///
/// Every operation collapses its failures into one of these variants before
/// they reach a client; storage and token-library errors never cross the
/// boundary unmapped.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or out-of-policy input (422)
    #[error("{message}")]
    Validation {
        message: String,
        details: serde_json::Value,
    },
    /// Bad credentials, invalid or expired token, inactive user (401)
    #[error("{0}")]
    Unauthorized(&'static str),
    /// Invalid new-resource request, e.g. duplicate email (400)
    #[error("{0}")]
    BadRequest(String),
    /// Authenticated but lacking a permission (403)
    #[error("{0}")]
    Forbidden(String),
    /// Unexpected failure (500)
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn validation(message: &str, details: serde_json::Value) -> Self {
        Self::Validation {
            message: message.to_string(),
            details,
        }
    }

    /// Translate into an HTTP error. Internal details are only attached when
    /// `expose_internal` is set (debug deployments).
    pub fn into_api_error(self, expose_internal: bool) -> ApiError {
        match self {
            AuthError::Validation { message, details } => ErrorType::UnprocessableEntity
                .with_message(message)
                .with_details(details),
            AuthError::Unauthorized(message) => ErrorType::Unauthorized.with_message(message),
            AuthError::BadRequest(message) => ErrorType::BadRequest.with_message(message),
            AuthError::Forbidden(message) => ErrorType::Forbidden.with_message(message),
            AuthError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error while handling auth request");
                let error =
                    ErrorType::InternalServerError.with_message("An internal error occurred");
                if expose_internal {
                    error.with_details(serde_json::json!({ "error": detail }))
                } else {
                    error
                }
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        error.into_api_error(false)
    }
}

impl From<RepositoryError> for AuthError {
    fn from(error: RepositoryError) -> Self {
        AuthError::Internal(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_error_basic() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", "Test error message");

        assert_eq!(error.code, Box::from("BAD_REQUEST"));
        assert_eq!(error.message, Box::from("Test error message"));
        assert_eq!(error.details, None);
    }

    #[test]
    fn test_content_type_header() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", "Test error");
        let response = error.into_response();

        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }

    #[test]
    fn test_unauthorized_sets_www_authenticate() {
        let error: ApiError = AuthError::Unauthorized(INVALID_CREDENTIALS).into();
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");
    }

    #[test]
    fn test_trace_id_generation() {
        let error = ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Test error",
        );

        let trace_id = error.trace_id.unwrap();
        assert!(trace_id.starts_with("corr-"));
        assert_eq!(trace_id.len(), 13);
    }

    #[test]
    fn test_auth_error_status_mapping() {
        let cases = [
            (
                AuthError::validation("bad", json!({})),
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_FAILED",
            ),
            (
                AuthError::Unauthorized(INVALID_TOKEN),
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
            ),
            (
                AuthError::BadRequest("Email already registered".into()),
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
            ),
            (
                AuthError::Forbidden("Missing permission".into()),
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
            ),
            (
                AuthError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
            ),
        ];

        for (error, status, code) in cases {
            let api_error: ApiError = error.into();
            assert_eq!(api_error.status, status);
            assert_eq!(api_error.code.as_ref(), code);
        }
    }

    #[test]
    fn test_error_type_carries_custom_message() {
        let error = ErrorType::Forbidden.with_message("Missing permission: fees:write");

        assert_eq!(error.status, StatusCode::FORBIDDEN);
        assert_eq!(error.code.as_ref(), "FORBIDDEN");
        assert_eq!(error.message.as_ref(), "Missing permission: fees:write");
    }

    #[test]
    fn test_internal_details_hidden_unless_exposed() {
        let hidden = AuthError::Internal("connection refused".into()).into_api_error(false);
        assert!(hidden.details.is_none());
        assert_eq!(hidden.message.as_ref(), "An internal error occurred");

        let exposed = AuthError::Internal("connection refused".into()).into_api_error(true);
        let details = exposed.details.unwrap();
        assert_eq!(details["error"], "connection refused");
    }

    #[test]
    fn test_repository_error_becomes_internal() {
        let error: AuthError = RepositoryError::Timeout(Duration::from_millis(50)).into();
        assert!(matches!(error, AuthError::Internal(_)));
    }

    #[test]
    fn test_record_not_found_is_not_conflict() {
        let error = RepositoryError::database_error(DbErr::RecordNotFound("users".into()));
        assert!(!error.is_conflict());
    }
}
