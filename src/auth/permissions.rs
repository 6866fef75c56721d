//! # Permission Resolver
//!
//! Maps a user, through their role, to an effective set of
//! `"resource:action"` strings. Recomputed on every call.

use std::collections::BTreeSet;
use std::time::Duration;

use sea_orm::ConnectionTrait;
use uuid::Uuid;

use crate::db::with_timeout;
use crate::error::RepositoryError;
use crate::models::user::Model as UserModel;
use crate::repositories::{PermissionRepository, RoleRepository, UserRepository};

pub struct PermissionResolver<'a, C> {
    db: &'a C,
    timeout: Duration,
}

impl<'a, C: ConnectionTrait> PermissionResolver<'a, C> {
    pub fn new(db: &'a C, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    /// Effective permissions of `user_id`. An unknown user or a user with
    /// no role resolves to the empty set.
    pub async fn resolve(&self, user_id: Uuid) -> Result<BTreeSet<String>, RepositoryError> {
        let user = with_timeout(self.timeout, UserRepository::new(self.db).find_by_id(user_id))
            .await?;
        match user {
            Some(user) => self.resolve_for(&user).await,
            None => Ok(BTreeSet::new()),
        }
    }

    /// Same as [`resolve`](Self::resolve) for an already loaded user.
    pub async fn resolve_for(&self, user: &UserModel) -> Result<BTreeSet<String>, RepositoryError> {
        let Some(role_id) = user.role_id else {
            return Ok(BTreeSet::new());
        };

        let role = with_timeout(self.timeout, RoleRepository::new(self.db).find_by_id(role_id))
            .await?;
        let Some(role) = role else {
            return Ok(BTreeSet::new());
        };

        let permission_ids = with_timeout(
            self.timeout,
            RoleRepository::new(self.db).permission_ids(role.id),
        )
        .await?;
        let permissions = with_timeout(
            self.timeout,
            PermissionRepository::new(self.db).find_by_ids(&permission_ids),
        )
        .await?;

        Ok(permissions.iter().map(|permission| permission.key()).collect())
    }
}
