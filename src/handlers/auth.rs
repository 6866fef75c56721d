//! # Auth API Handlers
//!
//! HTTP surface of the auth gateway under `/auth`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::service::{AuthSession, Identity, Registration};
use crate::auth::token::IssuedToken;
use crate::auth::{CurrentUser, TenantContext};
use crate::error::ApiError;
use crate::handlers::AppJson;
use crate::models::role::Model as RoleModel;
use crate::models::tenant::Model as TenantModel;
use crate::models::user::Model as UserModel;
use crate::server::AppState;

const TOKEN_TYPE: &str = "bearer";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "alice@example.com")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "alice@example.com")]
    pub email: String,
    /// At least 8 characters with upper, lower and a digit
    #[schema(example = "ValidPass123")]
    pub password: String,
    pub tenant_id: Uuid,
    /// Role within the tenant; defaults to the tenant's `user` role
    #[serde(default)]
    pub role_id: Option<Uuid>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub profile_data: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    #[schema(example = "alice@example.com")]
    pub email: String,
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub role_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub profile_data: Value,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserModel> for UserResponse {
    fn from(user: UserModel) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            email: user.email,
            role_id: user.role_id,
            profile_data: user.profile_data,
            is_active: user.is_active,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleResponse {
    pub id: Uuid,
    #[schema(example = "user")]
    pub name: String,
}

impl From<RoleModel> for RoleResponse {
    fn from(role: RoleModel) -> Self {
        Self {
            id: role.id,
            name: role.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TenantResponse {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub subscription_tier: String,
    pub is_active: bool,
    #[schema(value_type = Object)]
    pub config: Value,
}

impl From<TenantModel> for TenantResponse {
    fn from(tenant: TenantModel) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name,
            domain: tenant.domain,
            subscription_tier: tenant.subscription_tier,
            is_active: tenant.is_active,
            config: tenant.config,
        }
    }
}

/// Returned by login and registration.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "bearer")]
    pub token_type: String,
    /// Access-token lifetime in seconds
    #[schema(example = 1800)]
    pub expires_in: i64,
    pub user: UserResponse,
}

impl From<AuthSession> for TokenResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            access_token: session.access.token,
            refresh_token: session.refresh.token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: session.access.expires_in,
            user: session.user.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[schema(example = "bearer")]
    pub token_type: String,
    #[schema(example = 1800)]
    pub expires_in: i64,
}

impl From<IssuedToken> for AccessTokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            access_token: issued.token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: issued.expires_in,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WhoAmIResponse {
    pub user: UserResponse,
    /// Effective `resource:action` permissions, sorted
    pub permissions: Vec<String>,
    pub role: Option<RoleResponse>,
    pub tenant: TenantResponse,
}

impl From<Identity> for WhoAmIResponse {
    fn from(identity: Identity) -> Self {
        Self {
            user: identity.user.into(),
            permissions: identity.permissions.into_iter().collect(),
            role: identity.role.map(Into::into),
            tenant: identity.tenant.into(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuthorizeQuery {
    /// Permission to check, as `resource:action`
    #[param(example = "students:read")]
    #[serde(default)]
    pub permission: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeResponse {
    pub allowed: bool,
    #[schema(example = "students:read")]
    pub permission: String,
}

/// Exchange email and password for tokens
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 401, description = "Incorrect email or password", body = ApiError),
        (status = 422, description = "Malformed request body", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let session = state
        .auth
        .login(&request.email, &request.password)
        .await
        .map_err(|err| state.api_error(err))?;

    Ok(Json(session.into()))
}

/// Register a user under an existing tenant
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created and signed in", body = TokenResponse),
        (status = 400, description = "Duplicate email, unknown tenant or role", body = ApiError),
        (status = 422, description = "Password or email rejected by policy", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let registration = Registration {
        email: request.email,
        password: request.password,
        tenant_id: request.tenant_id,
        role_id: request.role_id,
        profile_data: request.profile_data.unwrap_or_default(),
    };

    let session = state
        .auth
        .register(registration)
        .await
        .map_err(|err| state.api_error(err))?;

    Ok((StatusCode::CREATED, Json(session.into())))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 401, description = "Invalid refresh token", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(request): AppJson<RefreshTokenRequest>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let access = state
        .auth
        .refresh(&request.refresh_token)
        .await
        .map_err(|err| state.api_error(err))?;

    Ok(Json(access.into()))
}

/// Revoke the session behind a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Logged out (also when no session matched)", body = MessageResponse),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    AppJson(request): AppJson<RefreshTokenRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth
        .logout(&request.refresh_token)
        .await
        .map_err(|err| state.api_error(err))?;

    Ok(Json(MessageResponse::ok("Successfully logged out")))
}

/// Describe the authenticated caller
#[utoipa::path(
    get,
    path = "/auth/me",
    security(("bearer_auth" = [])),
    params(crate::auth::extract::TenantHeader),
    responses(
        (status = 200, description = "Caller identity", body = WhoAmIResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn me(
    State(state): State<AppState>,
    tenant_context: TenantContext,
    CurrentUser(user): CurrentUser,
) -> Result<Json<WhoAmIResponse>, ApiError> {
    if let TenantContext(Some(requested)) = tenant_context
        && requested != user.tenant_id
    {
        debug!(
            user_id = %user.id,
            requested_tenant = %requested,
            "Tenant hint differs from the caller's tenant"
        );
    }

    let identity = state
        .auth
        .whoami(user)
        .await
        .map_err(|err| state.api_error(err))?;

    Ok(Json(identity.into()))
}

/// List the caller's effective permissions
#[utoipa::path(
    get,
    path = "/auth/permissions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sorted `resource:action` strings", body = [String]),
        (status = 401, description = "Missing, invalid or expired token", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn permissions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<String>>, ApiError> {
    let permissions = state
        .auth
        .permissions(&user)
        .await
        .map_err(|err| state.api_error(err))?;

    Ok(Json(permissions))
}

/// Check whether the caller holds a permission
#[utoipa::path(
    get,
    path = "/auth/authorize",
    security(("bearer_auth" = [])),
    params(AuthorizeQuery),
    responses(
        (status = 200, description = "Permission granted", body = AuthorizeResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ApiError),
        (status = 403, description = "Permission not granted", body = ApiError),
        (status = 422, description = "Malformed permission", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn authorize(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Json<AuthorizeResponse>, ApiError> {
    state
        .auth
        .authorize(&user, &query.permission)
        .await
        .map_err(|err| state.api_error(err))?;

    Ok(Json(AuthorizeResponse {
        allowed: true,
        permission: query.permission.trim().to_string(),
    }))
}

/// Request a password reset
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Accepted, whether or not the account exists", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(request): AppJson<ForgotPasswordRequest>,
) -> Json<MessageResponse> {
    state.auth.forgot_password(&request.email).await;

    Json(MessageResponse::ok(
        "If the email exists, a password reset link has been sent",
    ))
}
