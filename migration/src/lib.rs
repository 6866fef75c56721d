//! Database migrations for the auth service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_01_06_000001_create_tenants;
mod m2025_01_06_000002_create_roles;
mod m2025_01_06_000003_create_permissions;
mod m2025_01_06_000004_create_role_permissions;
mod m2025_01_06_000005_create_users;
mod m2025_01_06_000006_create_sessions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_01_06_000001_create_tenants::Migration),
            Box::new(m2025_01_06_000002_create_roles::Migration),
            Box::new(m2025_01_06_000003_create_permissions::Migration),
            Box::new(m2025_01_06_000004_create_role_permissions::Migration),
            Box::new(m2025_01_06_000005_create_users::Migration),
            Box::new(m2025_01_06_000006_create_sessions::Migration),
        ]
    }
}
