/*
 * Responsibility
 * - CredentialStore: tenant_id -> secret key / 既定 TTL の永続化境界
 * - Tenant 型 (secret は外に出さない)
 * - 実装: Postgres (tenant_repo) / in-memory (memory)
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::auth::secret::SecretKey;

pub mod error;
pub mod memory;
pub mod tenant_repo;

pub use error::{RepoError, RepoResult};

/// Default issuance lifetime applied when a tenant row carries none.
pub const DEFAULT_TTL_MINUTES: i32 = 60;

/// A tenant as seen outside the store. The signing secret is deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tenant {
    pub tenant_id: String,
    pub account_id: Option<String>,
    pub default_ttl_minutes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for `CredentialStore::create_tenant`. The secret is generated by the caller.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub tenant_id: String,
    pub account_id: Option<String>,
    pub secret_key: SecretKey,
    pub default_ttl_minutes: i32,
}

/// What issuance needs from one tenant row: the key and the default lifetime.
#[derive(Debug, Clone)]
pub struct SigningPolicy {
    pub secret_key: SecretKey,
    pub default_ttl_minutes: i32,
}

/// Partial update of the mutable tenant policy.
///
/// `account_id`: Some(Some(v)) -> set, Some(None) -> clear, None -> keep.
#[derive(Debug, Clone, Default)]
pub struct TenantUpdate {
    pub account_id: Option<Option<String>>,
    pub default_ttl_minutes: Option<i32>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Hot path: the only call made per verification.
    async fn get_secret_key(&self, tenant_id: &str) -> RepoResult<SecretKey>;
    /// Issuance path: secret and policy from a single read.
    async fn get_signing_policy(&self, tenant_id: &str) -> RepoResult<SigningPolicy>;

    async fn create_tenant(&self, tenant: NewTenant) -> RepoResult<Tenant>;
    async fn get_tenant(&self, tenant_id: &str) -> RepoResult<Tenant>;
    async fn list_tenants(&self) -> RepoResult<Vec<Tenant>>;
    async fn update_tenant(&self, tenant_id: &str, update: TenantUpdate) -> RepoResult<Tenant>;
    async fn delete_tenant(&self, tenant_id: &str) -> RepoResult<()>;

    fn backend_name(&self) -> &'static str;
}
