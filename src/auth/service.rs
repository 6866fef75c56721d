//! # Auth Gateway
//!
//! Composes the password hasher, token service, session registry and
//! permission resolver into the operations exposed over HTTP. Each operation
//! is a single request/response transaction; every failure leaves here as an
//! [`AuthError`].

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::auth::password::{
    PasswordError, PasswordHasher, normalize_email, validate_email, validate_password_strength,
};
use crate::auth::permissions::PermissionResolver;
use crate::auth::session::SessionRegistry;
use crate::auth::token::{IssuedToken, TokenError, TokenService, TokenSubject, TokenType};
use crate::config::AppConfig;
use crate::db::with_timeout;
use crate::error::{
    AuthError, INVALID_CREDENTIALS, INVALID_REFRESH_TOKEN, INVALID_TOKEN, RepositoryError,
};
use crate::models::role::Model as RoleModel;
use crate::models::tenant::Model as TenantModel;
use crate::models::user::Model as UserModel;
use crate::repositories::{NewUser, RoleRepository, TenantRepository, UserRepository};

/// Role assigned at registration when none is requested.
pub const DEFAULT_ROLE: &str = "user";

#[derive(Debug, Error)]
pub enum AuthInitError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Input for [`AuthService::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub tenant_id: Uuid,
    pub role_id: Option<Uuid>,
    pub profile_data: Map<String, Value>,
}

/// Tokens minted by login or registration together with the user.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
    pub user: UserModel,
}

/// Everything `whoami` reports about the caller.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: UserModel,
    pub permissions: BTreeSet<String>,
    pub role: Option<RoleModel>,
    pub tenant: TenantModel,
}

pub struct AuthService {
    db: DatabaseConnection,
    tokens: TokenService,
    hasher: PasswordHasher,
    sessions: Arc<SessionRegistry>,
    timeout: Duration,
}

impl AuthService {
    pub fn new(config: &AppConfig, db: DatabaseConnection) -> Result<Self, AuthInitError> {
        let tokens = TokenService::from_config(config)?;
        let hasher = PasswordHasher::new(config.bcrypt_cost)?;
        let sessions = Arc::new(SessionRegistry::new(
            db.clone(),
            config.refresh_token_ttl(),
            config.statement_timeout(),
        ));

        Ok(Self {
            db,
            tokens,
            hasher,
            sessions,
            timeout: config.statement_timeout(),
        })
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.sessions)
    }

    async fn bounded<T, F>(&self, future: F) -> Result<T, RepositoryError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        with_timeout(self.timeout, future).await
    }

    fn mint_pair(&self, user: &UserModel) -> Result<(IssuedToken, IssuedToken), AuthError> {
        let subject = TokenSubject::new(user.id, user.tenant_id);
        let access = self.tokens.issue_access(&subject)?;
        let refresh = self.tokens.issue_refresh(&subject)?;
        Ok((access, refresh))
    }

    /// Exchange credentials for an access/refresh pair.
    ///
    /// Unknown email, wrong password and inactive user are indistinguishable
    /// to the caller.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);
        let user = self
            .bounded(UserRepository::new(&self.db).find_by_email(&email))
            .await?;

        let Some(user) = user else {
            self.hasher.verify_dummy(password).await;
            counter!("auth_login_total", "outcome" => "unknown_user").increment(1);
            info!(outcome = "unknown_user", "Login rejected");
            return Err(AuthError::Unauthorized(INVALID_CREDENTIALS));
        };

        if !self.hasher.verify(password, &user.password_hash).await {
            counter!("auth_login_total", "outcome" => "bad_password").increment(1);
            info!(user_id = %user.id, outcome = "bad_password", "Login rejected");
            return Err(AuthError::Unauthorized(INVALID_CREDENTIALS));
        }

        if !user.is_active {
            counter!("auth_login_total", "outcome" => "inactive").increment(1);
            info!(user_id = %user.id, outcome = "inactive", "Login rejected");
            return Err(AuthError::Unauthorized(INVALID_CREDENTIALS));
        }

        let (access, refresh) = self.mint_pair(&user)?;
        self.sessions.create(user.id, &refresh.token).await?;

        let now = Utc::now();
        self.bounded(UserRepository::new(&self.db).record_login(user.id, now))
            .await?;

        counter!("auth_login_total", "outcome" => "success").increment(1);
        info!(user_id = %user.id, tenant_id = %user.tenant_id, "Login succeeded");

        Ok(AuthSession {
            access,
            refresh,
            user: UserModel {
                last_login: Some(now),
                ..user
            },
        })
    }

    /// Create a user under an existing tenant and sign them in.
    ///
    /// The user row and its first session are written in one transaction.
    #[instrument(skip_all, fields(tenant_id = %registration.tenant_id))]
    pub async fn register(&self, registration: Registration) -> Result<AuthSession, AuthError> {
        let email = validate_email(&registration.email)?;
        validate_password_strength(&registration.password)?;

        let tenant = self
            .bounded(TenantRepository::new(&self.db).get_tenant_by_id(registration.tenant_id))
            .await?
            .filter(|tenant| tenant.is_active)
            .ok_or_else(|| AuthError::BadRequest("Invalid tenant ID".to_string()))?;

        if self
            .bounded(UserRepository::new(&self.db).find_by_email(&email))
            .await?
            .is_some()
        {
            return Err(AuthError::BadRequest("Email already registered".to_string()));
        }

        let roles = RoleRepository::new(&self.db);
        let role = match registration.role_id {
            Some(role_id) => self
                .bounded(roles.find_by_id(role_id))
                .await?
                .filter(|role| role.tenant_id == tenant.id)
                .ok_or_else(|| AuthError::BadRequest("Invalid role ID".to_string()))?,
            None => {
                self.bounded(roles.find_or_create(tenant.id, DEFAULT_ROLE))
                    .await?
            }
        };

        let password_hash = self.hasher.hash(&registration.password).await?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(RepositoryError::database_error)?;

        let created = self
            .bounded(UserRepository::new(&txn).create(NewUser {
                tenant_id: tenant.id,
                email,
                password_hash,
                role_id: Some(role.id),
                profile_data: Value::Object(registration.profile_data),
            }))
            .await;
        let user = match created {
            Ok(user) => user,
            // Lost a race with a concurrent registration of the same email.
            Err(err) if err.is_conflict() => {
                return Err(AuthError::BadRequest("Email already registered".to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let (access, refresh) = self.mint_pair(&user)?;
        self.sessions
            .create_with(&txn, user.id, &refresh.token)
            .await?;

        txn.commit()
            .await
            .map_err(RepositoryError::database_error)?;

        info!(user_id = %user.id, role = %role.name, "User registered");

        Ok(AuthSession {
            access,
            refresh,
            user,
        })
    }

    /// Mint a new access token from a live refresh token. The refresh token
    /// itself is not rotated.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedToken, AuthError> {
        let claims = self
            .tokens
            .verify_kind(refresh_token, TokenType::Refresh)
            .map_err(|_| {
                counter!("auth_refresh_total", "outcome" => "invalid_token").increment(1);
                AuthError::Unauthorized(INVALID_REFRESH_TOKEN)
            })?;

        if !self.sessions.is_valid(refresh_token).await? {
            counter!("auth_refresh_total", "outcome" => "no_session").increment(1);
            info!(user_id = %claims.sub, "Refresh rejected: no live session");
            return Err(AuthError::Unauthorized(INVALID_REFRESH_TOKEN));
        }

        let user = self
            .bounded(UserRepository::new(&self.db).find_by_id(claims.sub))
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| {
                counter!("auth_refresh_total", "outcome" => "inactive").increment(1);
                AuthError::Unauthorized(INVALID_REFRESH_TOKEN)
            })?;

        let access = self
            .tokens
            .issue_access(&TokenSubject::new(user.id, user.tenant_id))?;
        counter!("auth_refresh_total", "outcome" => "success").increment(1);
        Ok(access)
    }

    /// Revoke the session behind a refresh token. Succeeds whether or not a
    /// session matched.
    #[instrument(skip_all)]
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let revoked = self.sessions.invalidate(refresh_token).await?;
        debug!(revoked, "Logout processed");
        Ok(())
    }

    /// Resolve a bearer access token to an active user.
    pub async fn authenticate(&self, access_token: &str) -> Result<UserModel, AuthError> {
        let claims = self.tokens.verify_kind(access_token, TokenType::Access)?;

        self.bounded(UserRepository::new(&self.db).find_by_id(claims.sub))
            .await?
            .filter(|user| user.is_active)
            .ok_or(AuthError::Unauthorized(INVALID_TOKEN))
    }

    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn whoami(&self, user: UserModel) -> Result<Identity, AuthError> {
        let permissions = PermissionResolver::new(&self.db, self.timeout)
            .resolve_for(&user)
            .await?;

        let role = match user.role_id {
            Some(role_id) => {
                self.bounded(RoleRepository::new(&self.db).find_by_id(role_id))
                    .await?
            }
            None => None,
        };

        let tenant = self
            .bounded(TenantRepository::new(&self.db).get_tenant_by_id(user.tenant_id))
            .await?
            .ok_or_else(|| AuthError::Internal(format!("tenant missing for user {}", user.id)))?;

        Ok(Identity {
            user,
            permissions,
            role,
            tenant,
        })
    }

    /// Effective permissions, sorted.
    pub async fn permissions(&self, user: &UserModel) -> Result<Vec<String>, AuthError> {
        let permissions = PermissionResolver::new(&self.db, self.timeout)
            .resolve_for(user)
            .await?;
        Ok(permissions.into_iter().collect())
    }

    /// Check that `user` holds `permission` (`"resource:action"`).
    #[instrument(skip_all, fields(user_id = %user.id, permission = %permission))]
    pub async fn authorize(&self, user: &UserModel, permission: &str) -> Result<(), AuthError> {
        let permission = permission.trim();
        match permission.split_once(':') {
            Some((resource, action)) if !resource.is_empty() && !action.is_empty() => {}
            _ => {
                return Err(AuthError::validation(
                    "Invalid permission",
                    json!({ "permission": "must have the form resource:action" }),
                ));
            }
        }

        let granted = PermissionResolver::new(&self.db, self.timeout)
            .resolve_for(user)
            .await?;
        if granted.contains(permission) {
            Ok(())
        } else {
            info!(outcome = "denied", "Permission check failed");
            Err(AuthError::Forbidden(format!("Missing permission: {permission}")))
        }
    }

    /// Accept a reset request without revealing whether the account exists.
    #[instrument(skip_all)]
    pub async fn forgot_password(&self, email: &str) {
        let email = normalize_email(email);
        match self
            .bounded(UserRepository::new(&self.db).find_by_email(&email))
            .await
        {
            Ok(Some(user)) if user.is_active => {
                info!(user_id = %user.id, "Password reset requested");
            }
            Ok(_) => debug!("Password reset requested for unknown or inactive account"),
            Err(err) => warn!(error = %err, "Password reset lookup failed"),
        }
    }
}
