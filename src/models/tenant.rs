//! Tenant entity model
//!
//! This module contains the SeaORM entity model for the tenants table,
//! the isolation boundary that owns users and roles.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

/// Tenant entity representing one school instance
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    /// Unique identifier for the tenant (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Display name for the tenant
    pub name: String,

    /// Domain the tenant is served under (globally unique)
    #[sea_orm(unique)]
    pub domain: String,

    /// Opaque tenant configuration, interpreted by collaborator services
    #[sea_orm(column_type = "JsonBinary")]
    pub config: JsonValue,

    /// Subscription tier label
    pub subscription_tier: String,

    /// Whether the tenant is active
    pub is_active: bool,

    /// Timestamp when the tenant was created
    pub created_at: DateTimeUtc,

    /// Timestamp when the tenant was last updated
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user::Entity")]
    Users,
    #[sea_orm(has_many = "super::role::Entity")]
    Roles,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Roles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
