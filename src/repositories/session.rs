//! # Session Repository
//!
//! Raw storage for refresh-token sessions keyed by token digest. Validity
//! rules live in [`crate::auth::session::SessionRegistry`].

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::Session;
use crate::models::session::{self, ActiveModel as SessionActiveModel, Model as SessionModel};

/// Repository for Session database operations
pub struct SessionRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> SessionRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn insert(
        &self,
        user_id: Uuid,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionModel, RepositoryError> {
        let model = SessionActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            token_hash: Set(token_hash),
            expires_at: Set(expires_at),
            created_at: Set(Utc::now()),
        };

        model
            .insert(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Session with this digest that has not expired at `now`.
    pub async fn find_unexpired(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionModel>, RepositoryError> {
        Session::find()
            .filter(session::Column::TokenHash.eq(token_hash))
            .filter(session::Column::ExpiresAt.gt(now))
            .one(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Delete the unexpired session with this digest in one statement.
    /// Returns the number of rows removed (0 or 1).
    pub async fn delete_unexpired(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = Session::delete_many()
            .filter(session::Column::TokenHash.eq(token_hash))
            .filter(session::Column::ExpiresAt.gt(now))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(result.rows_affected)
    }

    /// Delete every session with `expires_at <= now`.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = Session::delete_many()
            .filter(session::Column::ExpiresAt.lte(now))
            .exec(self.db)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(result.rows_affected)
    }

    pub async fn count_for_user(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        Session::find()
            .filter(session::Column::UserId.eq(user_id))
            .count(self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
