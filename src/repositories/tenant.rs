//! # Tenant Repository
//!
//! Tenant provisioning and lookups. Tenants are the isolation boundary for
//! users and roles.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::Expr,
};
use serde_json::Value;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::tenant::{self, ActiveModel as TenantActiveModel, Model as TenantModel};
use crate::models::Tenant;

/// Request data for provisioning a tenant
#[derive(Debug, Clone)]
pub struct CreateTenantRequest {
    pub name: String,
    pub domain: String,
    pub config: Option<Value>,
    pub subscription_tier: Option<String>,
}

/// Repository for Tenant database operations
pub struct TenantRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TenantRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Create a new tenant
    pub async fn create_tenant(
        &self,
        request: CreateTenantRequest,
    ) -> Result<TenantModel, RepositoryError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(RepositoryError::validation_error(
                "Tenant name cannot be empty",
            ));
        }
        let domain = request.domain.trim().to_ascii_lowercase();
        if domain.is_empty() {
            return Err(RepositoryError::validation_error(
                "Tenant domain cannot be empty",
            ));
        }

        let now = Utc::now();
        let tenant = TenantActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            domain: Set(domain),
            config: Set(request.config.unwrap_or_else(|| serde_json::json!({}))),
            subscription_tier: Set(request
                .subscription_tier
                .unwrap_or_else(|| "basic".to_string())),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        tenant
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Get tenant by ID
    pub async fn get_tenant_by_id(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<TenantModel>, RepositoryError> {
        Tenant::find_by_id(tenant_id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn get_tenant_by_domain(
        &self,
        domain: &str,
    ) -> Result<Option<TenantModel>, RepositoryError> {
        Tenant::find()
            .filter(tenant::Column::Domain.eq(domain.trim().to_ascii_lowercase()))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// List all tenants, oldest first
    pub async fn list_tenants(&self) -> Result<Vec<TenantModel>, RepositoryError> {
        Tenant::find()
            .order_by_asc(tenant::Column::CreatedAt)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Activate or deactivate a tenant. Inactive tenants accept no new
    /// registrations.
    pub async fn set_active(&self, tenant_id: Uuid, is_active: bool) -> Result<(), RepositoryError> {
        let result = Tenant::update_many()
            .col_expr(tenant::Column::IsActive, Expr::value(is_active))
            .col_expr(tenant::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(tenant::Column::Id.eq(tenant_id))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(format!("tenant {tenant_id}")));
        }
        Ok(())
    }
}
