/*
 * Responsibility
 * - clap によるコマンド定義 (serve + tenant / token の管理コマンド)
 * - 管理コマンドは DATABASE_URL (--db-url) 必須, 結果は stdout に出す
 */
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};

use crate::app;
use crate::config::Config;
use crate::repos::tenant_repo::PgTenantRepo;
use crate::repos::{CredentialStore, DEFAULT_TTL_MINUTES, Tenant, TenantUpdate};
use crate::services::auth::{IssueRequest, TokenIssuer, TokenVerifier};
use crate::services::tenants::{CreateTenant, TenantService};

#[derive(Debug, Parser)]
#[command(name = "extauth", about = "Per-tenant JWT issuance and ext-authz gateway")]
pub struct Cli {
    /// Postgres URL; overrides DATABASE_URL
    #[arg(long, global = true)]
    pub db_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP gateway (default)
    Serve,
    /// Create a tenant with a freshly generated secret
    #[command(alias = "customer-create")]
    TenantCreate {
        #[arg(long, alias = "customer-id")]
        tenant_id: String,
        #[arg(long)]
        account_id: Option<String>,
        #[arg(long, alias = "minutes", default_value_t = DEFAULT_TTL_MINUTES)]
        ttl_minutes: i32,
    },
    /// List all tenants (secrets are never printed)
    #[command(alias = "customer-list")]
    TenantList,
    TenantShow {
        #[arg(long, alias = "customer-id")]
        tenant_id: String,
    },
    TenantUpdate {
        #[arg(long, alias = "customer-id")]
        tenant_id: String,
        #[arg(long, conflicts_with = "clear_account")]
        account_id: Option<String>,
        /// Remove the tenant's account id
        #[arg(long)]
        clear_account: bool,
        #[arg(long, alias = "minutes")]
        ttl_minutes: Option<i32>,
    },
    TenantDelete {
        #[arg(long, alias = "customer-id")]
        tenant_id: String,
    },
    /// Issue a token for a tenant
    #[command(alias = "jwt-generate")]
    TokenIssue {
        #[arg(long, alias = "customer-id")]
        tenant_id: String,
        /// Defaults to the tenant's configured lifetime
        #[arg(long, alias = "minutes")]
        ttl_minutes: Option<i32>,
        #[arg(long)]
        account_id: Option<String>,
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Verify a token and print the identity it carries
    #[command(alias = "jwt-verify")]
    TokenVerify {
        #[arg(long)]
        token: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(url) = cli.db_url {
        config.database_url = Some(url);
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => app::serve(config).await?,
        Command::TenantCreate {
            tenant_id,
            account_id,
            ttl_minutes,
        } => {
            let tenant = tenant_service(&config)
                .await?
                .create(CreateTenant {
                    tenant_id,
                    account_id,
                    default_ttl_minutes: ttl_minutes,
                })
                .await?;
            println!("Tenant created successfully:");
            print_tenant(&tenant);
        }
        Command::TenantList => print_table(&tenant_service(&config).await?.list().await?),
        Command::TenantShow { tenant_id } => {
            print_tenant(&tenant_service(&config).await?.get(&tenant_id).await?)
        }
        Command::TenantUpdate {
            tenant_id,
            account_id,
            clear_account,
            ttl_minutes,
        } => {
            let account_id = if clear_account {
                Some(None)
            } else {
                account_id.map(Some)
            };
            let tenant = tenant_service(&config)
                .await?
                .update(
                    &tenant_id,
                    TenantUpdate {
                        account_id,
                        default_ttl_minutes: ttl_minutes,
                    },
                )
                .await?;
            println!("Tenant updated successfully:");
            print_tenant(&tenant);
        }
        Command::TenantDelete { tenant_id } => {
            tenant_service(&config).await?.delete(&tenant_id).await?;
            println!("Tenant {tenant_id} deleted.");
        }
        Command::TokenIssue {
            tenant_id,
            ttl_minutes,
            account_id,
            user_id,
        } => {
            let issuer = TokenIssuer::new(admin_store(&config).await?, config.display_offset);
            let issued = issuer
                .issue(IssueRequest {
                    tenant_id,
                    ttl_minutes,
                    account_id,
                    user_id,
                })
                .await?;
            println!("JWT Token generated:\n{}", issued.token);
        }
        Command::TokenVerify { token } => {
            let identity = TokenVerifier::new(admin_store(&config).await?)
                .verify(&token)
                .await?;
            let expiration = identity
                .exp
                .with_timezone(&config.display_offset)
                .to_rfc3339_opts(SecondsFormat::Secs, true);
            println!("Token verified successfully:");
            println!("  Customer ID: {}", identity.tenant_id);
            println!("  Account ID: {}", identity.account_id);
            println!("  User ID: {}", identity.user_id);
            println!("  Expiration: {expiration}");
        }
    }

    Ok(())
}

// The in-memory store lives only as long as this process, so admin commands need a real one.
async fn admin_store(config: &Config) -> anyhow::Result<Arc<dyn CredentialStore>> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL (or --db-url) is required for this command")?;
    let repo = PgTenantRepo::connect(url, config.db_max_connections, config.db_acquire_timeout)
        .await
        .context("failed to connect to credential store")?;
    Ok(Arc::new(repo))
}

async fn tenant_service(config: &Config) -> anyhow::Result<TenantService> {
    Ok(TenantService::new(admin_store(config).await?))
}

fn print_tenant(tenant: &Tenant) {
    println!("  Tenant ID: {}", tenant.tenant_id);
    println!("  Account ID: {}", tenant.account_id.as_deref().unwrap_or(""));
    println!("  Expiration Minutes: {}", tenant.default_ttl_minutes);
    println!("  Created At: {}", rfc3339(tenant.created_at));
    println!("  Updated At: {}", rfc3339(tenant.updated_at));
}

fn print_table(tenants: &[Tenant]) {
    if tenants.is_empty() {
        println!("No tenants found.");
        return;
    }

    println!(
        "{:<20} {:<20} {:<10} {:<20}",
        "Tenant ID", "Account ID", "Exp (min)", "Created At"
    );
    println!("{}", "-".repeat(75));
    for t in tenants {
        println!(
            "{:<20} {:<20} {:<10} {:<20}",
            t.tenant_id,
            t.account_id.as_deref().unwrap_or(""),
            t.default_ttl_minutes,
            rfc3339(t.created_at)
        );
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
