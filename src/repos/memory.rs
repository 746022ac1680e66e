//! In-memory implementation of the credential store.
//!
//! Used by tests and by `serve` when no `DATABASE_URL` is configured.
//! - **Not durable**: all tenants and secrets are lost on restart.
//! - Enforces the same uniqueness rules as the Postgres schema
//!   (`tenant_id` and non-null `account_id`).
//! - Readers never observe a partially written tenant: every mutation happens
//!   under the write lock.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::repos::error::{RepoError, RepoResult};
use crate::repos::{CredentialStore, NewTenant, SigningPolicy, Tenant, TenantUpdate};
use crate::services::auth::secret::SecretKey;

#[derive(Debug, Clone)]
struct StoredTenant {
    tenant: Tenant,
    secret_key: SecretKey,
}

#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<HashMap<String, StoredTenant>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn account_taken(
    tenants: &HashMap<String, StoredTenant>,
    account_id: Option<&str>,
    except: &str,
) -> bool {
    let Some(account_id) = account_id else {
        return false;
    };
    tenants.values().any(|t| {
        t.tenant.tenant_id != except && t.tenant.account_id.as_deref() == Some(account_id)
    })
}

#[async_trait]
impl CredentialStore for InMemoryTenantStore {
    async fn get_secret_key(&self, tenant_id: &str) -> RepoResult<SecretKey> {
        let tenants = self.tenants.read().await;
        tenants
            .get(tenant_id)
            .map(|t| t.secret_key.clone())
            .ok_or(RepoError::NotFound)
    }

    async fn get_signing_policy(&self, tenant_id: &str) -> RepoResult<SigningPolicy> {
        let tenants = self.tenants.read().await;
        tenants
            .get(tenant_id)
            .map(|t| SigningPolicy {
                secret_key: t.secret_key.clone(),
                default_ttl_minutes: t.tenant.default_ttl_minutes,
            })
            .ok_or(RepoError::NotFound)
    }

    async fn create_tenant(&self, new: NewTenant) -> RepoResult<Tenant> {
        let mut tenants = self.tenants.write().await;
        if tenants.contains_key(&new.tenant_id)
            || account_taken(&tenants, new.account_id.as_deref(), &new.tenant_id)
        {
            return Err(RepoError::Conflict);
        }

        let now = Utc::now();
        let tenant = Tenant {
            tenant_id: new.tenant_id.clone(),
            account_id: new.account_id,
            default_ttl_minutes: new.default_ttl_minutes,
            created_at: now,
            updated_at: now,
        };
        tenants.insert(
            new.tenant_id,
            StoredTenant {
                tenant: tenant.clone(),
                secret_key: new.secret_key,
            },
        );
        Ok(tenant)
    }

    async fn get_tenant(&self, tenant_id: &str) -> RepoResult<Tenant> {
        let tenants = self.tenants.read().await;
        tenants
            .get(tenant_id)
            .map(|t| t.tenant.clone())
            .ok_or(RepoError::NotFound)
    }

    async fn list_tenants(&self) -> RepoResult<Vec<Tenant>> {
        let tenants = self.tenants.read().await;
        let mut items: Vec<Tenant> = tenants.values().map(|t| t.tenant.clone()).collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn update_tenant(&self, tenant_id: &str, update: TenantUpdate) -> RepoResult<Tenant> {
        let mut tenants = self.tenants.write().await;
        if let Some(account_id) = &update.account_id
            && account_taken(&tenants, account_id.as_deref(), tenant_id)
        {
            return Err(RepoError::Conflict);
        }

        let stored = tenants.get_mut(tenant_id).ok_or(RepoError::NotFound)?;
        if let Some(account_id) = update.account_id {
            stored.tenant.account_id = account_id;
        }
        if let Some(ttl) = update.default_ttl_minutes {
            stored.tenant.default_ttl_minutes = ttl;
        }
        stored.tenant.updated_at = Utc::now();
        Ok(stored.tenant.clone())
    }

    async fn delete_tenant(&self, tenant_id: &str) -> RepoResult<()> {
        let mut tenants = self.tenants.write().await;
        tenants
            .remove(tenant_id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
