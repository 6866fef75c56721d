//! # Authentication and Authorization
//!
//! The tenant-scoped auth core: credential hashing, signed tokens,
//! revocable sessions, permission resolution and the gateway composing them.

pub mod extract;
pub mod password;
pub mod permissions;
pub mod service;
pub mod session;
pub mod token;

pub use extract::{CurrentUser, TenantContext};
pub use service::AuthService;
