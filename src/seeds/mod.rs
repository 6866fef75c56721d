//! Database seeding functionality
//!
//! Populates global reference data that tenants build their roles on.

pub mod permission;

pub use permission::{CATALOG_ACTIONS, CATALOG_RESOURCES, seed_permissions};
