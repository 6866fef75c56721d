//! # Repository Layer
//!
//! Repositories encapsulate SeaORM operations for the credential store. Each
//! borrows any [`sea_orm::ConnectionTrait`] so the same code runs against the
//! pool or inside a transaction. Lookups return `Ok(None)` for "not found";
//! `Err` is reserved for storage failures.

pub mod permission;
pub mod role;
pub mod session;
pub mod tenant;
pub mod user;

pub use permission::PermissionRepository;
pub use role::RoleRepository;
pub use session::SessionRepository;
pub use tenant::TenantRepository;
pub use user::{NewUser, UserRepository};
