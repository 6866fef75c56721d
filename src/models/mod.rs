//! # Data Models
//!
//! SeaORM entities for the credential store plus small shared response types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod permission;
pub mod role;
pub mod role_permission;
pub mod session;
pub mod tenant;
pub mod user;

pub use permission::Entity as Permission;
pub use role::Entity as Role;
pub use role_permission::Entity as RolePermission;
pub use session::Entity as Session;
pub use tenant::Entity as Tenant;
pub use user::Entity as User;

/// Liveness response returned by `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"healthy"` when the process is serving
    #[schema(example = "healthy")]
    pub status: String,
    /// The name of the service
    #[schema(example = "auth-service")]
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl HealthResponse {
    pub fn healthy(service: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            service: service.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
