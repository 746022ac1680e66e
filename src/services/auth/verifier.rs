//! Tenant-scoped token verification.
//!
//! The signing key depends on the tenant, and the tenant is named inside the
//! token, so verification is a two-pass pipeline. Each stage is a distinct type
//! and only the next stage can be built from it:
//!
//! 1. [`Parsed`]: structural decode without trusting anything. Only the header
//!    `alg` and the `customerId` key selector are read.
//! 2. [`KeyResolved`]: the tenant's secret has been loaded from the store.
//! 3. [`SignatureVerified`]: HMAC algorithm enforced and signature checked; the
//!    full claim set is decoded only now.
//! 4. `exp` (and `nbf` when present) is checked against the caller's `now`, producing
//!    [`VerifiedIdentity`].
//!
//! No claim other than `customerId` exists in memory before stage 3 succeeds.
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::repos::CredentialStore;
use crate::services::auth::AuthError;
use crate::services::auth::claims::{KeySelector, UnverifiedHeader, VerifiedClaims, VerifiedIdentity};
use crate::services::auth::secret::SecretKey;

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Clone)]
pub struct TokenVerifier {
    store: Arc<dyn CredentialStore>,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("store", &self.store.backend_name())
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        // exp and nbf are checked in the last stage against an explicit `now`.
        validation.validate_nbf = false;
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self { store, validation }
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        self.verify_at(token, Utc::now()).await
    }

    /// Run the full pipeline as of `now`. Caller decides what now is.
    pub async fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedIdentity, AuthError> {
        Parsed::parse(token)?
            .resolve_key(self.store.as_ref())
            .await?
            .verify_signature(&self.validation)?
            .check_expiration(now)
    }
}

/// Stage 1 output. Nothing in here has been authenticated.
struct Parsed<'t> {
    token: &'t str,
    alg: String,
    tenant_id: String,
}

/// Stage 2 output.
struct KeyResolved<'t> {
    parsed: Parsed<'t>,
    key: SecretKey,
}

/// Stage 3 output: claims from a token whose signature matched the tenant key.
struct SignatureVerified {
    claims: VerifiedClaims,
}

impl<'t> Parsed<'t> {
    fn parse(token: &'t str) -> Result<Self, AuthError> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::MalformedToken(
                "expected three dot-separated segments",
            ));
        };

        let header: UnverifiedHeader = decode_segment(header)
            .ok_or(AuthError::MalformedToken("header is not a valid JOSE header"))?;
        let selector: KeySelector = decode_segment(payload)
            .ok_or(AuthError::MalformedToken("customerId not found in token"))?;

        Ok(Self {
            token,
            alg: header.alg,
            tenant_id: selector.customer_id,
        })
    }

    async fn resolve_key(self, store: &dyn CredentialStore) -> Result<KeyResolved<'t>, AuthError> {
        let key = store
            .get_secret_key(&self.tenant_id)
            .await
            .map_err(|e| AuthError::from_lookup(&self.tenant_id, e))?;

        debug!(tenant_id = %self.tenant_id, "resolved tenant signing key");
        Ok(KeyResolved { parsed: self, key })
    }
}

impl KeyResolved<'_> {
    fn verify_signature(self, validation: &Validation) -> Result<SignatureVerified, AuthError> {
        let alg = self.parsed.alg;
        if !matches!(alg.as_str(), "HS256" | "HS384" | "HS512") {
            return Err(AuthError::AlgorithmMismatch(alg));
        }

        let data = jsonwebtoken::decode::<VerifiedClaims>(
            self.parsed.token,
            &DecodingKey::from_secret(self.key.hmac_key()),
            validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
            // Header and payload already decoded in stage 1, so only the signature
            // segment can fail base64 here.
            ErrorKind::Base64(_) => AuthError::SignatureInvalid,
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => AuthError::AlgorithmMismatch(alg.clone()),
            ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::MalformedToken("claims have an unexpected shape")
            }
            _ => AuthError::MalformedToken("token rejected by decoder"),
        })?;

        debug!(tenant_id = %data.claims.customer_id, alg = %alg, "token signature verified");
        Ok(SignatureVerified {
            claims: data.claims,
        })
    }
}

impl SignatureVerified {
    fn check_expiration(self, now: DateTime<Utc>) -> Result<VerifiedIdentity, AuthError> {
        let exp = self.claims.exp.ok_or(AuthError::MissingExpiration)?;
        let exp = DateTime::from_timestamp(exp, 0)
            .ok_or(AuthError::MalformedToken("exp is out of range"))?;

        // Absolute instants on both sides; exp must be strictly in the future.
        if exp <= now {
            return Err(AuthError::Expired);
        }
        // nbf is optional; when present it may equal now but not be after it.
        if let Some(nbf) = self.claims.nbf
            && nbf > now.timestamp()
        {
            return Err(AuthError::NotYetValid);
        }

        Ok(VerifiedIdentity {
            tenant_id: self.claims.customer_id,
            account_id: self.claims.account_id.unwrap_or_default(),
            user_id: self.claims.user_id.unwrap_or_default(),
            exp,
        })
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::issuer::{IssueRequest, TokenIssuer};
    use crate::services::auth::testing::{at, sign_claims, store_with, unavailable_store, unsigned};
    use chrono::{Offset, TimeDelta};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    async fn acme_and_globex() -> (TokenVerifier, Arc<dyn CredentialStore>) {
        let store = store_with(&[("acme", "acme-secret", 60), ("globex", "globex-secret", 60)]).await;
        (TokenVerifier::new(store.clone()), store)
    }

    #[tokio::test]
    async fn verifies_issued_token() {
        let (verifier, store) = acme_and_globex().await;
        let issuer = TokenIssuer::new(store, Utc.fix());
        let now = Utc::now();

        let issued = issuer
            .issue(IssueRequest {
                tenant_id: "acme".to_string(),
                ttl_minutes: Some(15),
                ..Default::default()
            })
            .await
            .expect("issue");

        let identity = verifier.verify(&issued.token).await.expect("verify");
        assert_eq!(identity.tenant_id, "acme");
        assert_eq!(identity.account_id, "");
        assert_eq!(identity.user_id, "");
        // exp carries second precision only.
        assert!(identity.exp >= now - TimeDelta::seconds(1));
        assert!(identity.exp <= now + TimeDelta::minutes(15) + TimeDelta::seconds(1));
    }

    #[tokio::test]
    async fn exposes_optional_identity_claims() {
        let (verifier, _) = acme_and_globex().await;
        let token = sign_claims(
            "acme-secret",
            json!({"customerId": "acme", "accountId": "acct-1", "userId": "u-7", "exp": NOW + 60}),
        );

        let identity = verifier.verify_at(&token, at(NOW)).await.expect("verify");
        assert_eq!(identity.account_id, "acct-1");
        assert_eq!(identity.user_id, "u-7");
        assert_eq!(identity.exp, at(NOW + 60));
    }

    #[tokio::test]
    async fn any_signature_change_is_rejected() {
        let (verifier, _) = acme_and_globex().await;
        let token = sign_claims("acme-secret", json!({"customerId": "acme", "exp": NOW + 60}));
        let sig_start = token.rfind('.').expect("signature") + 1;

        for i in sig_start..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).expect("utf8");

            let err = verifier
                .verify_at(&tampered, at(NOW))
                .await
                .expect_err("tampered");
            assert!(matches!(err, AuthError::SignatureInvalid), "position {i}: {err:?}");
        }
    }

    #[tokio::test]
    async fn payload_change_is_rejected() {
        let (verifier, _) = acme_and_globex().await;
        let token = sign_claims("acme-secret", json!({"customerId": "acme", "exp": NOW + 60}));
        let signature = token.rsplit('.').next().expect("signature");

        // Extend the lifetime without re-signing.
        let forged = unsigned(
            json!({"alg": "HS256", "typ": "JWT"}),
            json!({"customerId": "acme", "exp": NOW + 86_400}),
            signature,
        );
        let err = verifier.verify_at(&forged, at(NOW)).await.expect_err("forged");
        assert!(matches!(err, AuthError::SignatureInvalid));
    }

    #[tokio::test]
    async fn non_hmac_algorithms_are_rejected() {
        let (verifier, _) = acme_and_globex().await;
        let genuine = sign_claims("acme-secret", json!({"customerId": "acme", "exp": NOW + 60}));
        let genuine_sig = genuine.rsplit('.').next().expect("signature");
        let claims = json!({"customerId": "acme", "exp": NOW + 60});

        for alg in ["none", "None", "RS256", "ES256", "PS256", "EdDSA"] {
            for sig in ["", genuine_sig] {
                let token = unsigned(json!({"alg": alg, "typ": "JWT"}), claims.clone(), sig);
                let err = verifier.verify_at(&token, at(NOW)).await.expect_err(alg);
                assert!(
                    matches!(err, AuthError::AlgorithmMismatch(ref a) if a == alg),
                    "{alg}: {err:?}"
                );
            }
        }
    }

    #[tokio::test]
    async fn whole_hmac_family_is_accepted() {
        let (verifier, _) = acme_and_globex().await;
        for alg in [Algorithm::HS384, Algorithm::HS512] {
            let token = jsonwebtoken::encode(
                &jsonwebtoken::Header::new(alg),
                &json!({"customerId": "acme", "exp": NOW + 60}),
                &jsonwebtoken::EncodingKey::from_secret(b"acme-secret"),
            )
            .expect("sign");
            let identity = verifier.verify_at(&token, at(NOW)).await.expect("verify");
            assert_eq!(identity.tenant_id, "acme");
        }
    }

    #[tokio::test]
    async fn expiration_boundary() {
        let (verifier, _) = acme_and_globex().await;

        let past = sign_claims("acme-secret", json!({"customerId": "acme", "exp": NOW - 1}));
        let err = verifier.verify_at(&past, at(NOW)).await.expect_err("expired");
        assert!(matches!(err, AuthError::Expired));

        let exact = sign_claims("acme-secret", json!({"customerId": "acme", "exp": NOW}));
        let err = verifier.verify_at(&exact, at(NOW)).await.expect_err("expired");
        assert!(matches!(err, AuthError::Expired));

        let future = sign_claims("acme-secret", json!({"customerId": "acme", "exp": NOW + 1}));
        verifier.verify_at(&future, at(NOW)).await.expect("valid");
    }

    #[tokio::test]
    async fn not_before_boundary() {
        let (verifier, _) = acme_and_globex().await;

        let early = sign_claims(
            "acme-secret",
            json!({"customerId": "acme", "exp": NOW + 60, "nbf": NOW + 1}),
        );
        let err = verifier.verify_at(&early, at(NOW)).await.expect_err("not yet valid");
        assert!(matches!(err, AuthError::NotYetValid));
        assert_eq!(err.code(), "NOT_YET_VALID");

        let exact = sign_claims(
            "acme-secret",
            json!({"customerId": "acme", "exp": NOW + 60, "nbf": NOW}),
        );
        verifier.verify_at(&exact, at(NOW)).await.expect("valid at nbf");
    }

    #[tokio::test]
    async fn missing_expiration_is_rejected() {
        let (verifier, _) = acme_and_globex().await;
        let token = sign_claims("acme-secret", json!({"customerId": "acme", "iat": NOW}));
        let err = verifier.verify_at(&token, at(NOW)).await.expect_err("no exp");
        assert!(matches!(err, AuthError::MissingExpiration));
    }

    #[tokio::test]
    async fn key_from_another_tenant_is_rejected() {
        let (verifier, _) = acme_and_globex().await;
        // Signed with acme's key but claims to be globex.
        let token = sign_claims("acme-secret", json!({"customerId": "globex", "exp": NOW + 60}));
        let err = verifier.verify_at(&token, at(NOW)).await.expect_err("cross tenant");
        assert!(matches!(err, AuthError::SignatureInvalid));
    }

    #[tokio::test]
    async fn malformed_tokens() {
        let (verifier, _) = acme_and_globex().await;
        let cases = [
            "".to_string(),
            "abc".to_string(),
            "invalid.token.string".to_string(),
            "a.b.c.d".to_string(),
            unsigned(json!({"alg": "HS256"}), json!({"accountId": "acct"}), "sig"),
            unsigned(json!({"alg": "HS256"}), json!({"customerId": 42}), "sig"),
            unsigned(json!({"typ": "JWT"}), json!({"customerId": "acme"}), "sig"),
        ];

        for token in cases {
            let err = verifier.verify_at(&token, at(NOW)).await.expect_err("malformed");
            assert!(matches!(err, AuthError::MalformedToken(_)), "{token}: {err:?}");
        }
    }

    #[tokio::test]
    async fn wrongly_typed_claims_after_signature_are_malformed() {
        let (verifier, _) = acme_and_globex().await;
        let token = sign_claims(
            "acme-secret",
            json!({"customerId": "acme", "userId": 12, "exp": NOW + 60}),
        );
        let err = verifier.verify_at(&token, at(NOW)).await.expect_err("bad shape");
        assert!(matches!(err, AuthError::MalformedToken(_)));
    }

    #[tokio::test]
    async fn unknown_tenant_vs_unavailable_store() {
        let (verifier, _) = acme_and_globex().await;
        let token = sign_claims("whatever", json!({"customerId": "initech", "exp": NOW + 60}));
        let err = verifier.verify_at(&token, at(NOW)).await.expect_err("unknown");
        assert!(matches!(err, AuthError::UnknownTenant(ref t) if t == "initech"));
        assert!(!err.is_transient());

        let verifier = TokenVerifier::new(unavailable_store());
        let token = sign_claims("acme-secret", json!({"customerId": "acme", "exp": NOW + 60}));
        let err = verifier.verify_at(&token, at(NOW)).await.expect_err("store down");
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
        assert!(err.is_transient());
        assert!(!err.to_string().contains("pool"));
    }

    #[tokio::test]
    async fn acme_token_expires_after_its_ttl() {
        let store = store_with(&[("acme", "K", 60)]).await;
        let issuer = TokenIssuer::new(store.clone(), Utc.fix());
        let verifier = TokenVerifier::new(store);
        let t0 = at(NOW);

        let issued = issuer
            .issue_at(
                IssueRequest {
                    tenant_id: "acme".to_string(),
                    ttl_minutes: Some(5),
                    ..Default::default()
                },
                t0,
            )
            .await
            .expect("issue");

        let identity = verifier.verify_at(&issued.token, t0).await.expect("fresh");
        assert_eq!(identity.tenant_id, "acme");
        assert_eq!(identity.account_id, "");

        let later = t0 + TimeDelta::minutes(5) + TimeDelta::seconds(1);
        let err = verifier
            .verify_at(&issued.token, later)
            .await
            .expect_err("expired");
        assert!(matches!(err, AuthError::Expired));
    }
}
