//! # Server Configuration
//!
//! Application state, router assembly and the HTTP serve loop.

use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::error::{ApiError, AuthError, ErrorType};
use crate::handlers;
use crate::telemetry::{self, TraceContext};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Render a domain failure, attaching internals only in debug mode.
    pub fn api_error(&self, error: AuthError) -> ApiError {
        error.into_api_error(self.config.debug)
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.config)
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.auth)
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let auth_routes = Router::new()
        .route("/login", post(handlers::auth::login))
        .route("/register", post(handlers::auth::register))
        .route("/refresh", post(handlers::auth::refresh))
        .route("/logout", post(handlers::auth::logout))
        .route("/forgot-password", post(handlers::auth::forgot_password))
        .route("/me", get(handlers::auth::me))
        .route("/permissions", get(handlers::auth::permissions))
        .route("/authorize", get(handlers::auth::authorize));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/readyz", get(handlers::ready))
        .route("/openapi.json", get(handlers::openapi))
        .nest("/auth", auth_routes)
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<axum::body::Body>| {
                let trace_id = request
                    .extensions()
                    .get::<TraceContext>()
                    .map(|ctx| ctx.trace_id.as_str())
                    .unwrap_or_default();
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    trace_id = %trace_id,
                )
            },
        ))
        .layer(middleware::from_fn(telemetry::trace_context_middleware))
        .layer(cors)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-tenant-id"),
            header::HeaderName::from_static("x-request-id"),
        ]);

    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

fn handle_panic(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!(panic = %detail, "Handler panicked");

    let mut response = ApiError::from(ErrorType::InternalServerError).into_response();
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Starts the server and serves until `shutdown` fires.
pub async fn run_server(
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = state
        .config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let profile = state.config.profile.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health,
        crate::handlers::ready,
        crate::handlers::auth::login,
        crate::handlers::auth::register,
        crate::handlers::auth::refresh,
        crate::handlers::auth::logout,
        crate::handlers::auth::me,
        crate::handlers::auth::permissions,
        crate::handlers::auth::authorize,
        crate::handlers::auth::forgot_password,
    ),
    components(
        schemas(
            crate::models::HealthResponse,
            crate::handlers::ReadinessResponse,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::RefreshTokenRequest,
            crate::handlers::auth::ForgotPasswordRequest,
            crate::handlers::auth::TokenResponse,
            crate::handlers::auth::AccessTokenResponse,
            crate::handlers::auth::MessageResponse,
            crate::handlers::auth::UserResponse,
            crate::handlers::auth::RoleResponse,
            crate::handlers::auth::TenantResponse,
            crate::handlers::auth::WhoAmIResponse,
            crate::handlers::auth::AuthorizeResponse,
            crate::error::ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "School Auth API",
        description = "Tenant-scoped authentication and authorization for the school platform",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
