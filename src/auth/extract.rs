//! Request extractors for bearer authentication and collaborator tenant scoping.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Query},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::service::AuthService;
use crate::config::AppConfig;
use crate::error::{ApiError, AuthError, INVALID_TOKEN};
use crate::models::user::Model as UserModel;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// The active user behind a valid `Authorization: Bearer <access_token>`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserModel);

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<AuthService>: FromRef<S>,
    Arc<AppConfig>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<AuthService>::from_ref(state);
        let config = Arc::<AppConfig>::from_ref(state);

        let result = match bearer_token(&parts.headers) {
            Some(token) => auth.authenticate(token).await,
            None => Err(AuthError::Unauthorized(INVALID_TOKEN)),
        };

        result
            .map(CurrentUser)
            .map_err(|err| err.into_api_error(config.debug))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Tenant hint supplied by the caller through `X-Tenant-ID` or the
/// `tenant_id` query parameter. The header wins when both are present.
///
/// Downstream services use this to scope their own queries; the auth core
/// never rejects a request because of it. A hint that is not a UUID is
/// treated as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TenantContext(pub Option<Uuid>);

#[derive(Debug, Default, Deserialize)]
struct TenantQuery {
    tenant_id: Option<String>,
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_header = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string());
        let from_query = Query::<TenantQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(query)| query.tenant_id)
            .map(|value| value.trim().to_string());

        let Some(raw) = from_header.or(from_query).filter(|raw| !raw.is_empty()) else {
            return Ok(TenantContext(None));
        };

        match raw.parse::<Uuid>() {
            Ok(id) => Ok(TenantContext(Some(id))),
            Err(_) => {
                tracing::debug!("Ignoring tenant hint that is not a UUID");
                Ok(TenantContext(None))
            }
        }
    }
}

/// OpenAPI header parameter for X-Tenant-ID
#[derive(Debug, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Header)]
pub struct TenantHeader {
    /// Optional tenant identifier (UUID) forwarded to collaborator services
    #[serde(rename = "X-Tenant-ID")]
    #[param(rename = "X-Tenant-ID", value_type = Option<String>)]
    pub tenant_id: Option<String>,
}
