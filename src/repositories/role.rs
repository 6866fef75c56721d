//! # Role Repository
//!
//! Roles are tenant-scoped; `(tenant_id, name)` is unique. Grants live in the
//! `role_permissions` join table.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::role::{self, ActiveModel as RoleActiveModel, Model as RoleModel};
use crate::models::role_permission::{self, ActiveModel as RolePermissionActiveModel};
use crate::models::{Role, RolePermission};

/// Repository for Role database operations
pub struct RoleRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> RoleRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, role_id: Uuid) -> Result<Option<RoleModel>, RepositoryError> {
        Role::find_by_id(role_id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_by_name(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<RoleModel>, RepositoryError> {
        Role::find()
            .filter(role::Column::TenantId.eq(tenant_id))
            .filter(role::Column::Name.eq(name))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn create(&self, tenant_id: Uuid, name: &str) -> Result<RoleModel, RepositoryError> {
        let role = RoleActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
        };

        role.insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Return the tenant's role called `name`, creating it when absent.
    ///
    /// A concurrent creator may win the insert; the unique violation is then
    /// resolved by re-reading the row it wrote.
    pub async fn find_or_create(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<RoleModel, RepositoryError> {
        if let Some(existing) = self.find_by_name(tenant_id, name).await? {
            return Ok(existing);
        }

        match self.create(tenant_id, name).await {
            Ok(created) => Ok(created),
            Err(err) if err.is_conflict() => self
                .find_by_name(tenant_id, name)
                .await?
                .ok_or_else(|| RepositoryError::NotFound(format!("role {name}"))),
            Err(err) => Err(err),
        }
    }

    /// Ids of the permissions granted to `role_id`.
    pub async fn permission_ids(&self, role_id: Uuid) -> Result<Vec<Uuid>, RepositoryError> {
        RolePermission::find()
            .select_only()
            .column(role_permission::Column::PermissionId)
            .filter(role_permission::Column::RoleId.eq(role_id))
            .into_tuple::<Uuid>()
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Grant a permission to a role. Granting twice is a no-op; returns
    /// whether a new grant was written.
    pub async fn grant(&self, role_id: Uuid, permission_id: Uuid) -> Result<bool, RepositoryError> {
        let existing = RolePermission::find_by_id((role_id, permission_id))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        if existing.is_some() {
            return Ok(false);
        }

        let grant = RolePermissionActiveModel {
            role_id: Set(role_id),
            permission_id: Set(permission_id),
        };
        match RolePermission::insert(grant).exec_without_returning(self.db).await {
            Ok(_) => Ok(true),
            Err(err) => match RepositoryError::database_error(err) {
                RepositoryError::Conflict(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    pub async fn revoke(&self, role_id: Uuid, permission_id: Uuid) -> Result<bool, RepositoryError> {
        let result = RolePermission::delete_by_id((role_id, permission_id))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(result.rows_affected > 0)
    }
}
