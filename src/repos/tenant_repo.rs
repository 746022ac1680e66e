/*
 * Responsibility
 * - customers テーブル向け SQLx 操作 (CredentialStore の Postgres 実装)
 * - PgPool を受け取り CRUD を提供
 * - DB エラーは RepoError に変換して返す
 */
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use crate::repos::error::{RepoError, RepoResult};
use crate::repos::{
    CredentialStore, DEFAULT_TTL_MINUTES, NewTenant, SigningPolicy, Tenant, TenantUpdate,
};
use crate::services::auth::secret::SecretKey;

/// Postgres-backed credential store.
///
/// The schema is managed outside this service and is assumed to be:
///   - customers.customer_id (varchar, unique, not null)
///   - customers.account_id (varchar, unique, nullable)
///
/// `account_id` must be nullable for tenants without one. Against a schema that
/// declares it NOT NULL, creating such a tenant fails with `RepoError::Invalid`.
///   - customers.secret_key (text, not null)
///   - customers.expiration_minutes (integer, default 60)
///   - customers.created_at / updated_at (timestamp, default current_timestamp)
#[derive(Clone, Debug)]
pub struct PgTenantRepo {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct CustomerRow {
    customer_id: String,
    account_id: Option<String>,
    expiration_minutes: Option<i32>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl From<CustomerRow> for Tenant {
    fn from(row: CustomerRow) -> Self {
        Tenant {
            tenant_id: row.customer_id,
            account_id: row.account_id,
            default_ttl_minutes: row.expiration_minutes.unwrap_or(DEFAULT_TTL_MINUTES),
            created_at: row.created_at.and_utc(),
            updated_at: row.updated_at.and_utc(),
        }
    }
}

impl PgTenantRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool. `acquire_timeout` is the deadline applied to every store call.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> RepoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CredentialStore for PgTenantRepo {
    async fn get_secret_key(&self, tenant_id: &str) -> RepoResult<SecretKey> {
        let secret = sqlx::query_scalar::<_, String>(
            r#"
            SELECT secret_key
            FROM customers
            WHERE customer_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepoError::NotFound)?;

        Ok(SecretKey::from_encoded(secret))
    }

    async fn get_signing_policy(&self, tenant_id: &str) -> RepoResult<SigningPolicy> {
        let (secret, expiration_minutes) = sqlx::query_as::<_, (String, Option<i32>)>(
            r#"
            SELECT secret_key, expiration_minutes
            FROM customers
            WHERE customer_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepoError::NotFound)?;

        Ok(SigningPolicy {
            secret_key: SecretKey::from_encoded(secret),
            default_ttl_minutes: expiration_minutes.unwrap_or(DEFAULT_TTL_MINUTES),
        })
    }

    async fn create_tenant(&self, tenant: NewTenant) -> RepoResult<Tenant> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            INSERT INTO customers (customer_id, account_id, secret_key, expiration_minutes)
            VALUES ($1, $2, $3, $4)
            RETURNING customer_id, account_id, expiration_minutes, created_at, updated_at
            "#,
        )
        .bind(&tenant.tenant_id)
        .bind(tenant.account_id.as_deref())
        .bind(tenant.secret_key.expose())
        .bind(tenant.default_ttl_minutes)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get_tenant(&self, tenant_id: &str) -> RepoResult<Tenant> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT customer_id, account_id, expiration_minutes, created_at, updated_at
            FROM customers
            WHERE customer_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }

    async fn list_tenants(&self) -> RepoResult<Vec<Tenant>> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT customer_id, account_id, expiration_minutes, created_at, updated_at
            FROM customers
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Tenant::from).collect())
    }

    async fn update_tenant(&self, tenant_id: &str, update: TenantUpdate) -> RepoResult<Tenant> {
        // account_id: Some(Some(v)) -> set to v
        // account_id: Some(None)    -> set to NULL
        // account_id: None          -> do not update
        let set_account = update.account_id.is_some();
        let account_id = update.account_id.flatten();

        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            UPDATE customers
            SET
                account_id = CASE
                    WHEN $2 = false THEN account_id
                    ELSE $3
                END,
                expiration_minutes = COALESCE($4, expiration_minutes),
                updated_at = CURRENT_TIMESTAMP
            WHERE customer_id = $1
            RETURNING customer_id, account_id, expiration_minutes, created_at, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(set_account)
        .bind(account_id)
        .bind(update.default_ttl_minutes)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }

    async fn delete_tenant(&self, tenant_id: &str) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM customers
            WHERE customer_id = $1
            "#,
        )
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
