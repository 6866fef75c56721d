//! # Permission Repository
//!
//! Permissions are global; tenants differentiate through which permissions
//! their roles are granted.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::Permission;
use crate::models::permission::{
    self, ActiveModel as PermissionActiveModel, Model as PermissionModel,
};

/// Repository for Permission database operations
pub struct PermissionRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> PermissionRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<PermissionModel>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Permission::find()
            .filter(permission::Column::Id.is_in(ids.iter().copied()))
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// First permission whose rendered key is `resource:action`.
    pub async fn find_by_key(
        &self,
        resource: &str,
        action: &str,
    ) -> Result<Option<PermissionModel>, RepositoryError> {
        Permission::find()
            .filter(permission::Column::Resource.eq(resource))
            .filter(permission::Column::Action.eq(action))
            .order_by_asc(permission::Column::CreatedAt)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn list_all(&self) -> Result<Vec<PermissionModel>, RepositoryError> {
        Permission::find()
            .order_by_asc(permission::Column::Resource)
            .order_by_asc(permission::Column::Action)
            .all(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Insert the `(name, resource, action)` triple unless it already exists.
    pub async fn upsert(
        &self,
        name: &str,
        resource: &str,
        action: &str,
        description: Option<&str>,
    ) -> Result<PermissionModel, RepositoryError> {
        let existing = Permission::find()
            .filter(permission::Column::Name.eq(name))
            .filter(permission::Column::Resource.eq(resource))
            .filter(permission::Column::Action.eq(action))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let model = PermissionActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            resource: Set(resource.to_string()),
            action: Set(action.to_string()),
            description: Set(description.map(str::to_string)),
            created_at: Set(Utc::now()),
        };

        model
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
