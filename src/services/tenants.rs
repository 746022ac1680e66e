use std::sync::Arc;

use tracing::info;

use crate::repos::{CredentialStore, NewTenant, RepoError, Tenant, TenantUpdate};
use crate::services::auth::{AuthError, secret};

/// Administrative tenant lifecycle. Not on the verification path.
#[derive(Clone)]
pub struct TenantService {
    store: Arc<dyn CredentialStore>,
}

#[derive(Debug, Clone)]
pub struct CreateTenant {
    pub tenant_id: String,
    pub account_id: Option<String>,
    pub default_ttl_minutes: i32,
}

impl TenantService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Create a tenant with a freshly generated secret.
    pub async fn create(&self, req: CreateTenant) -> Result<Tenant, AuthError> {
        let tenant_id = req.tenant_id.trim().to_string();
        if tenant_id.is_empty() {
            return Err(AuthError::InvalidArgument(
                "tenant_id must not be empty".to_string(),
            ));
        }
        validate_ttl(req.default_ttl_minutes)?;

        let secret_key = secret::generate()?;
        let tenant = self
            .store
            .create_tenant(NewTenant {
                tenant_id: tenant_id.clone(),
                account_id: normalize(req.account_id),
                secret_key,
                default_ttl_minutes: req.default_ttl_minutes,
            })
            .await
            .map_err(|e| match e {
                RepoError::Conflict => AuthError::TenantExists(tenant_id.clone()),
                other => AuthError::from_store(other),
            })?;

        info!(tenant_id = %tenant.tenant_id, "tenant created");
        Ok(tenant)
    }

    pub async fn get(&self, tenant_id: &str) -> Result<Tenant, AuthError> {
        self.store
            .get_tenant(tenant_id)
            .await
            .map_err(|e| AuthError::from_lookup(tenant_id, e))
    }

    pub async fn list(&self) -> Result<Vec<Tenant>, AuthError> {
        self.store
            .list_tenants()
            .await
            .map_err(AuthError::from_store)
    }

    pub async fn update(&self, tenant_id: &str, update: TenantUpdate) -> Result<Tenant, AuthError> {
        if let Some(ttl) = update.default_ttl_minutes {
            validate_ttl(ttl)?;
        }
        let update = TenantUpdate {
            account_id: update.account_id.map(normalize),
            ..update
        };

        let tenant = self
            .store
            .update_tenant(tenant_id, update)
            .await
            .map_err(|e| match e {
                RepoError::Conflict => AuthError::TenantExists(tenant_id.to_string()),
                other => AuthError::from_lookup(tenant_id, other),
            })?;

        info!(tenant_id = %tenant.tenant_id, "tenant updated");
        Ok(tenant)
    }

    pub async fn delete(&self, tenant_id: &str) -> Result<(), AuthError> {
        self.store
            .delete_tenant(tenant_id)
            .await
            .map_err(|e| AuthError::from_lookup(tenant_id, e))?;

        info!(tenant_id = %tenant_id, "tenant deleted");
        Ok(())
    }
}

fn validate_ttl(ttl_minutes: i32) -> Result<(), AuthError> {
    if ttl_minutes <= 0 {
        return Err(AuthError::InvalidArgument(format!(
            "default ttl must be a positive number of minutes, got {ttl_minutes}"
        )));
    }
    Ok(())
}

// Blank account ids are stored as NULL so they never trip the uniqueness rule.
fn normalize(account_id: Option<String>) -> Option<String> {
    account_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
