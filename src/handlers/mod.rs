//! # API Handlers
//!
//! HTTP endpoint handlers for the auth service.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::config::AppConfig;
use crate::db;
use crate::error::{ApiError, ErrorType};
use crate::models::HealthResponse;
use crate::server::{ApiDoc, AppState};

pub mod auth;

/// JSON body extractor whose rejections are problem+json 422 responses.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadinessResponse {
    #[schema(example = "ready")]
    pub status: String,
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    ),
    tag = "operations"
)]
pub async fn health(State(config): State<Arc<AppConfig>>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(&config.service_name))
}

/// Readiness probe; round-trips the credential store
#[utoipa::path(
    get,
    path = "/readyz",
    responses(
        (status = 200, description = "Database reachable", body = ReadinessResponse),
        (status = 503, description = "Database unreachable", body = ApiError)
    ),
    tag = "operations"
)]
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadinessResponse>, ApiError> {
    match db::health_check(&state.db).await {
        Ok(()) => Ok(Json(ReadinessResponse {
            status: "ready".to_string(),
        })),
        Err(err) => {
            tracing::warn!(error = %err, "Readiness check failed");
            Err(ErrorType::ServiceUnavailable.into())
        }
    }
}

/// OpenAPI document for this service
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ErrorType::NotFound.into()
}
