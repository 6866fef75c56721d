//! Test utilities for database and server testing.
//!
//! Builds in-memory SQLite databases with every migration applied, plus
//! fixtures for tenants, roles, grants and a spawned HTTP server.

use std::sync::Arc;

use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use school_auth::{
    auth::AuthService,
    config::AppConfig,
    models::{role::Model as RoleModel, tenant::Model as TenantModel, user::Model as UserModel},
    repositories::{
        NewUser, PermissionRepository, RoleRepository, TenantRepository, UserRepository,
        tenant::CreateTenantRequest,
    },
    server::{AppState, create_app},
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use uuid::Uuid;

#[allow(dead_code)]
pub const TEST_SECRET: &str = "integration-test-secret-key-0123456789abcdef";
#[allow(dead_code)]
pub const TEST_PASSWORD: &str = "ValidPass123";

/// Sets up an in-memory SQLite database with all migrations applied.
///
/// The pool holds exactly one connection; a second connection would open a
/// different, empty in-memory database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opt).await?;

    Migrator::up(&db, None).await?;

    Ok(db)
}

/// Configuration with a fixed signing key and the cheapest bcrypt cost.
#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        database_url: "sqlite::memory:".to_string(),
        jwt_secret_key: Some(TEST_SECRET.to_string()),
        bcrypt_cost: 4,
        ..AppConfig::default()
    }
}

#[allow(dead_code)]
pub fn build_auth(config: &AppConfig, db: &DatabaseConnection) -> Arc<AuthService> {
    Arc::new(AuthService::new(config, db.clone()).expect("auth service"))
}

#[allow(dead_code)]
pub fn build_state(config: AppConfig, db: DatabaseConnection) -> AppState {
    let auth = build_auth(&config, &db);
    AppState {
        config: Arc::new(config),
        db,
        auth,
    }
}

/// Creates an active tenant served under `domain`.
#[allow(dead_code)]
pub async fn create_test_tenant(db: &DatabaseConnection, domain: &str) -> Result<TenantModel> {
    TenantRepository::new(db)
        .create_tenant(CreateTenantRequest {
            name: format!("School {domain}"),
            domain: domain.to_string(),
            config: None,
            subscription_tier: None,
        })
        .await
        .context("creating test tenant")
}

/// Grants `resource:action` to the tenant's role called `role_name`,
/// creating both the permission and the role when missing.
#[allow(dead_code)]
pub async fn grant_permission(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    role_name: &str,
    key: &str,
) -> Result<RoleModel> {
    let (resource, action) = key
        .split_once(':')
        .context("permission key must be resource:action")?;
    let permission = PermissionRepository::new(db)
        .upsert(key, resource, action, None)
        .await?;
    let roles = RoleRepository::new(db);
    let role = roles.find_or_create(tenant_id, role_name).await?;
    roles.grant(role.id, permission.id).await?;
    Ok(role)
}

/// Inserts a user directly, bypassing registration policy. The stored
/// digest matches no password.
#[allow(dead_code)]
pub async fn insert_user(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    email: &str,
    role_id: Option<Uuid>,
) -> Result<UserModel> {
    UserRepository::new(db)
        .create(NewUser {
            tenant_id,
            email: email.to_string(),
            password_hash: "not-a-bcrypt-digest".to_string(),
            role_id,
            profile_data: serde_json::json!({}),
        })
        .await
        .context("inserting test user")
}

pub struct TestServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<Result<()>>>,
}

#[allow(dead_code)]
impl TestServerHandle {
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.join_handle.take() {
            let result = handle.await.context("server task join failed")?;
            result?;
        }

        Ok(())
    }
}

impl Drop for TestServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Serves the router on an ephemeral local port.
#[allow(dead_code)]
pub async fn spawn_test_app(state: AppState) -> Result<(String, TestServerHandle)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = create_app(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let join_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .context("test server failed")
    });

    Ok((
        format!("http://{addr}"),
        TestServerHandle {
            shutdown_tx: Some(shutdown_tx),
            join_handle: Some(join_handle),
        },
    ))
}
