use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use tracing::{debug, error};

use crate::repos::CredentialStore;
use crate::services::auth::AuthError;
use crate::services::auth::claims::IssuedClaims;
use crate::services::auth::secret::SecretKey;

#[derive(Debug, Clone, Default)]
pub struct IssueRequest {
    pub tenant_id: String,
    /// Falls back to the tenant's `default_ttl_minutes`.
    pub ttl_minutes: Option<i32>,
    pub account_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub ttl_minutes: i32,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Mints HS256 tokens signed with the tenant's own secret.
#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn CredentialStore>,
    display_offset: FixedOffset,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("store", &self.store.backend_name())
            .field("display_offset", &self.display_offset)
            .finish()
    }
}

impl TokenIssuer {
    /// `display_offset` only affects how timestamps are logged; `exp`/`iat` are always UTC.
    pub fn new(store: Arc<dyn CredentialStore>, display_offset: FixedOffset) -> Self {
        Self {
            store,
            display_offset,
        }
    }

    pub async fn issue(&self, req: IssueRequest) -> Result<IssuedToken, AuthError> {
        self.issue_at(req, Utc::now()).await
    }

    /// Issue a token as of `now`. Caller decides what now is.
    pub async fn issue_at(
        &self,
        req: IssueRequest,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        if req.tenant_id.trim().is_empty() {
            return Err(AuthError::InvalidArgument(
                "tenant_id must not be empty".to_string(),
            ));
        }
        if let Some(ttl) = req.ttl_minutes {
            validate_ttl(ttl)?;
        }

        // One read: the key and the default lifetime come from the same row.
        let policy = self
            .store
            .get_signing_policy(&req.tenant_id)
            .await
            .map_err(|e| AuthError::from_lookup(&req.tenant_id, e))?;

        let ttl_minutes = match req.ttl_minutes {
            Some(ttl) => ttl,
            None => {
                validate_ttl(policy.default_ttl_minutes)?;
                policy.default_ttl_minutes
            }
        };

        let expires_at = TimeDelta::try_minutes(i64::from(ttl_minutes))
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::InvalidArgument("ttl_minutes is out of range".to_string()))?;

        let claims = IssuedClaims {
            customer_id: &req.tenant_id,
            account_id: req.account_id.as_deref().filter(|s| !s.is_empty()),
            user_id: req.user_id.as_deref().filter(|s| !s.is_empty()),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let token = sign(&claims, &policy.secret_key)?;

        debug!(
            tenant_id = %req.tenant_id,
            ttl_minutes,
            expires_at = %expires_at.with_timezone(&self.display_offset).to_rfc3339(),
            "issued token"
        );

        Ok(IssuedToken {
            token,
            ttl_minutes,
            issued_at: now,
            expires_at,
        })
    }
}

fn validate_ttl(ttl_minutes: i32) -> Result<(), AuthError> {
    if ttl_minutes <= 0 {
        return Err(AuthError::InvalidArgument(format!(
            "ttl_minutes must be a positive integer, got {ttl_minutes}"
        )));
    }
    Ok(())
}

fn sign(claims: &IssuedClaims<'_>, secret: &SecretKey) -> Result<String, AuthError> {
    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".to_string());
    jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(secret.hmac_key())).map_err(
        |e| {
            error!(error = %e, "failed to sign JWT");
            AuthError::SigningFailure
        },
    )
}
