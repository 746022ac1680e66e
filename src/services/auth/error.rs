use thiserror::Error;

use crate::repos::RepoError;

/// Failure kinds of issuance and verification.
///
/// `Display` is the human-readable reason returned to callers, so it must
/// never contain secret material or raw store errors. The store error is kept
/// as `source` for logs only.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization header required")]
    MissingHeader,

    #[error("malformed token: {0}")]
    MalformedToken(&'static str),

    #[error("unknown tenant: {0}")]
    UnknownTenant(String),

    #[error("unexpected signing method: {0}")]
    AlgorithmMismatch(String),

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("expiration not found in token")]
    MissingExpiration,

    #[error("token expired")]
    Expired,

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("credential store unavailable")]
    StoreUnavailable(#[source] RepoError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("tenant already exists: {0}")]
    TenantExists(String),

    #[error("failed to generate secret key")]
    KeyGenerationFailure,

    #[error("failed to sign token")]
    SigningFailure,
}

impl AuthError {
    /// Stable machine-readable code for response bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingHeader => "MISSING_HEADER",
            Self::MalformedToken(_) => "MALFORMED_TOKEN",
            Self::UnknownTenant(_) => "UNKNOWN_TENANT",
            Self::AlgorithmMismatch(_) => "ALGORITHM_MISMATCH",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::MissingExpiration => "MISSING_EXPIRATION",
            Self::Expired => "EXPIRED",
            Self::NotYetValid => "NOT_YET_VALID",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::TenantExists(_) => "TENANT_EXISTS",
            Self::KeyGenerationFailure => "KEY_GENERATION_FAILURE",
            Self::SigningFailure => "SIGNING_FAILURE",
        }
    }

    /// Transient failures a caller may retry; everything else is final for the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Map a store lookup keyed by `tenant_id`.
    pub(crate) fn from_lookup(tenant_id: &str, e: RepoError) -> Self {
        match e {
            RepoError::NotFound => Self::UnknownTenant(tenant_id.to_string()),
            other => Self::from_store(other),
        }
    }

    /// Rejected input stays final; only a failing store is `StoreUnavailable`.
    pub(crate) fn from_store(e: RepoError) -> Self {
        match e {
            RepoError::Invalid(reason) => Self::InvalidArgument(reason.to_string()),
            other => Self::StoreUnavailable(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_rejections_are_final_and_outages_are_transient() {
        let err = AuthError::from_lookup("acme", RepoError::Invalid("value too long"));
        assert!(matches!(err, AuthError::InvalidArgument(ref m) if m == "value too long"));
        assert!(!err.is_transient());

        let err = AuthError::from_lookup("acme", RepoError::NotFound);
        assert!(matches!(err, AuthError::UnknownTenant(ref t) if t == "acme"));
        assert!(!err.is_transient());

        let err = AuthError::from_store(RepoError::Db(sqlx::Error::PoolTimedOut));
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "credential store unavailable");
    }
}
