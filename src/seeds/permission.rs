//! Permission catalog seeding
//!
//! Seeds one `resource:action` permission for every platform service and
//! access level. Re-running the seed leaves existing rows untouched.

use anyhow::{Context, Result};
use sea_orm::ConnectionTrait;

use crate::repositories::PermissionRepository;

/// Services whose data is guarded by the auth core.
pub const CATALOG_RESOURCES: [&str; 9] = [
    "students",
    "staff",
    "fees",
    "exams",
    "homework",
    "library",
    "attendance",
    "timetable",
    "communication",
];

pub const CATALOG_ACTIONS: [&str; 2] = ["read", "write"];

/// Seeds the global permission catalog.
///
/// Returns the number of permissions the catalog holds afterwards.
pub async fn seed_permissions<C: ConnectionTrait>(db: &C) -> Result<usize> {
    let repo = PermissionRepository::new(db);
    let before = repo
        .list_all()
        .await
        .context("listing existing permissions")?
        .len();

    for resource in CATALOG_RESOURCES {
        for action in CATALOG_ACTIONS {
            let name = format!("{resource}:{action}");
            let description = describe(resource, action);
            repo.upsert(&name, resource, action, Some(description.as_str()))
                .await
                .with_context(|| format!("seeding permission {name}"))?;
        }
    }

    let after = repo
        .list_all()
        .await
        .context("listing seeded permissions")?
        .len();

    if after > before {
        log::info!("Seeded {} new permissions ({} total)", after - before, after);
    } else {
        log::info!("Permission catalog already seeded ({} total)", after);
    }

    Ok(after)
}

fn describe(resource: &str, action: &str) -> String {
    match action {
        "read" => format!("View {resource} records"),
        _ => format!("Create and modify {resource} records"),
    }
}
