//! User entity model
//!
//! This module contains the SeaORM entity model for the users table.
//! The password hash never leaves this layer; API responses are built from
//! [`crate::handlers::auth::UserResponse`].

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

/// User entity belonging to exactly one tenant
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Email address (globally unique)
    #[sea_orm(unique)]
    pub email: String,

    /// bcrypt digest of the password
    pub password_hash: String,

    /// Assigned role, if any
    pub role_id: Option<Uuid>,

    /// Free-form profile payload, interpreted by collaborator services
    #[sea_orm(column_type = "JsonBinary")]
    pub profile_data: JsonValue,

    /// Whether the user may authenticate
    pub is_active: bool,

    /// Timestamp of the last successful login
    pub last_login: Option<DateTimeUtc>,

    /// Timestamp when the user was created
    pub created_at: DateTimeUtc,

    /// Timestamp when the user was last updated
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id",
        on_delete = "Cascade"
    )]
    Tenant,
    #[sea_orm(
        belongs_to = "super::role::Entity",
        from = "Column::RoleId",
        to = "super::role::Column::Id",
        on_delete = "SetNull"
    )]
    Role,
    #[sea_orm(has_many = "super::session::Entity")]
    Sessions,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Role.def()
    }
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
