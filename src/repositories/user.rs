//! # User Repository

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};
use serde_json::Value;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::User;
use crate::models::user::{self, ActiveModel as UserActiveModel, Model as UserModel};

/// Data required to insert a user. `email` must already be normalised and
/// `password_hash` must be a bcrypt digest.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub tenant_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role_id: Option<Uuid>,
    pub profile_data: Value,
}

/// Repository for User database operations
pub struct UserRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> UserRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserModel>, RepositoryError> {
        User::find_by_id(user_id)
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, RepositoryError> {
        User::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Insert a new active user. A duplicate email surfaces as
    /// [`RepositoryError::Conflict`].
    pub async fn create(&self, new_user: NewUser) -> Result<UserModel, RepositoryError> {
        let now = Utc::now();
        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(new_user.tenant_id),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            role_id: Set(new_user.role_id),
            profile_data: Set(new_user.profile_data),
            is_active: Set(true),
            last_login: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        user.insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Stamp `last_login`. Single-column update so concurrent logins never
    /// clobber other fields.
    pub async fn record_login(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        User::update_many()
            .col_expr(user::Column::LastLogin, Expr::value(at))
            .filter(user::Column::Id.eq(user_id))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(())
    }

    pub async fn set_role(
        &self,
        user_id: Uuid,
        role_id: Option<Uuid>,
    ) -> Result<(), RepositoryError> {
        let result = User::update_many()
            .col_expr(user::Column::RoleId, Expr::value(role_id))
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(user_id))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    pub async fn set_active(&self, user_id: Uuid, is_active: bool) -> Result<(), RepositoryError> {
        let result = User::update_many()
            .col_expr(user::Column::IsActive, Expr::value(is_active))
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(user_id))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }
}
