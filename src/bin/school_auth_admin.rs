//! Operator commands for the auth service: schema migration, tenant
//! provisioning, permission catalog seeding, role grants and session cleanup.

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use school_auth::{
    auth::session::SessionRegistry,
    config::{AppConfig, ConfigLoader},
    db,
    models::tenant::Model as TenantModel,
    repositories::{
        PermissionRepository, RoleRepository, TenantRepository, tenant::CreateTenantRequest,
    },
    seeds,
};
use sea_orm::DatabaseConnection;
use serde_json::json;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "school_auth_admin")]
#[command(about = "Administrative commands for the school auth service")]
struct Cli {
    /// Database URL; when given, layered configuration files are not consulted
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending schema migrations
    Migrate,
    /// Provision a new tenant
    CreateTenant {
        #[arg(long)]
        name: String,
        #[arg(long)]
        domain: String,
        #[arg(long)]
        tier: Option<String>,
    },
    /// List tenants, oldest first
    ListTenants,
    /// Activate or deactivate a tenant
    SetTenantActive {
        /// Tenant id or domain
        #[arg(long)]
        tenant: String,
        #[arg(long, action = ArgAction::Set)]
        active: bool,
    },
    /// Seed the global permission catalog
    SeedPermissions,
    /// Grant a permission to a tenant role, creating the role if needed
    Grant {
        /// Tenant id or domain
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        role: String,
        /// Permission key in `resource:action` form
        #[arg(long)]
        permission: String,
    },
    /// Delete expired refresh sessions
    SweepSessions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(cli.database_url)?;
    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    match cli.command {
        Commands::Migrate => {
            Migrator::up(&db, None)
                .await
                .context("applying migrations")?;
            println!("{}", json!({ "migrated": true }));
        }
        Commands::CreateTenant { name, domain, tier } => {
            let tenant = TenantRepository::new(&db)
                .create_tenant(CreateTenantRequest {
                    name,
                    domain,
                    config: None,
                    subscription_tier: tier,
                })
                .await
                .context("creating tenant")?;
            println!(
                "{}",
                json!({
                    "id": tenant.id,
                    "name": tenant.name,
                    "domain": tenant.domain,
                    "subscription_tier": tenant.subscription_tier,
                })
            );
        }
        Commands::ListTenants => {
            let tenants = TenantRepository::new(&db)
                .list_tenants()
                .await
                .context("listing tenants")?;
            for tenant in tenants {
                println!(
                    "{}",
                    json!({
                        "id": tenant.id,
                        "name": tenant.name,
                        "domain": tenant.domain,
                        "is_active": tenant.is_active,
                    })
                );
            }
        }
        Commands::SetTenantActive { tenant, active } => {
            let tenant = find_tenant(&db, &tenant).await?;
            TenantRepository::new(&db)
                .set_active(tenant.id, active)
                .await
                .context("updating tenant")?;
            println!("{}", json!({ "id": tenant.id, "is_active": active }));
        }
        Commands::SeedPermissions => {
            let total = seeds::seed_permissions(&db).await?;
            println!("{}", json!({ "permissions": total }));
        }
        Commands::Grant {
            tenant,
            role,
            permission,
        } => {
            let granted = grant(&db, &tenant, &role, &permission).await?;
            println!(
                "{}",
                json!({
                    "role": role,
                    "permission": permission,
                    "granted": granted,
                })
            );
        }
        Commands::SweepSessions => {
            let registry = SessionRegistry::new(
                db.clone(),
                config.refresh_token_ttl(),
                config.statement_timeout(),
            );
            let removed = registry
                .sweep_expired()
                .await
                .context("sweeping expired sessions")?;
            println!("{}", json!({ "removed": removed }));
        }
    }

    Ok(())
}

fn resolve_config(database_url: Option<String>) -> Result<AppConfig> {
    match database_url {
        Some(database_url) => Ok(AppConfig {
            database_url,
            ..AppConfig::default()
        }),
        None => ConfigLoader::new().load().context("loading configuration"),
    }
}

async fn grant(
    db: &DatabaseConnection,
    tenant: &str,
    role_name: &str,
    permission: &str,
) -> Result<bool> {
    let Some((resource, action)) = permission.split_once(':') else {
        bail!("permission must be in resource:action form, got '{permission}'");
    };

    let tenant = find_tenant(db, tenant).await?;
    let permission = PermissionRepository::new(db)
        .find_by_key(resource, action)
        .await
        .context("looking up permission")?
        .ok_or_else(|| {
            anyhow!("unknown permission '{resource}:{action}'; run seed-permissions first")
        })?;

    let roles = RoleRepository::new(db);
    let role = roles
        .find_or_create(tenant.id, role_name)
        .await
        .context("resolving role")?;
    roles
        .grant(role.id, permission.id)
        .await
        .context("granting permission")
}

async fn find_tenant(db: &DatabaseConnection, tenant: &str) -> Result<TenantModel> {
    let repo = TenantRepository::new(db);
    let found = match Uuid::parse_str(tenant) {
        Ok(tenant_id) => repo.get_tenant_by_id(tenant_id).await,
        Err(_) => repo.get_tenant_by_domain(tenant).await,
    }
    .context("looking up tenant")?;
    found.ok_or_else(|| anyhow!("tenant '{tenant}' not found"))
}
