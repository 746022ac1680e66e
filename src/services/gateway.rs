//! External-authorization decision for a fronting proxy.
//!
//! A 200 response means "allow" and the identity headers on it are what the
//! proxy forwards to the backend. Anything else means "deny".
use std::sync::Arc;

use axum::Json;
use axum::http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ErrorBody, ErrorResponse};
use crate::services::auth::{AuthError, TokenVerifier, VerifiedIdentity};

pub const BEARER_PREFIX: &str = "Bearer ";

pub static X_CUSTOMER_ID: HeaderName = HeaderName::from_static("x-customer-id");
pub static X_ACCOUNT_ID: HeaderName = HeaderName::from_static("x-account-id");
pub static X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub static X_TOKEN_VERIFIED: HeaderName = HeaderName::from_static("x-token-verified");
pub static X_TOKEN_EXPIRATION: HeaderName = HeaderName::from_static("x-token-expiration");

#[derive(Debug)]
pub enum Decision {
    Allow(VerifiedIdentity),
    Deny(AuthError),
}

/// Body of an allow response; mirrors the forwarded headers for debugging.
#[derive(Debug, Serialize)]
pub struct AuthorizedBody {
    pub status: &'static str,
    pub customer_id: String,
    pub account_id: String,
    pub user_id: String,
    pub expires_at: String,
}

#[derive(Clone, Debug)]
pub struct AuthorizationGateway {
    verifier: Arc<TokenVerifier>,
    display_offset: FixedOffset,
}

impl AuthorizationGateway {
    pub fn new(verifier: Arc<TokenVerifier>, display_offset: FixedOffset) -> Self {
        Self {
            verifier,
            display_offset,
        }
    }

    pub async fn decide(&self, headers: &HeaderMap) -> Decision {
        self.decide_at(headers, Utc::now()).await
    }

    pub async fn decide_at(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Decision {
        let token = match bearer_token(headers) {
            Ok(token) => token,
            Err(err) => return Decision::Deny(err),
        };

        match self.verifier.verify_at(token, now).await {
            Ok(identity) => Decision::Allow(identity),
            Err(err) => Decision::Deny(err),
        }
    }

    /// Render a decision into the proxy contract.
    pub fn render(&self, decision: Decision) -> Response {
        let identity = match decision {
            Decision::Allow(identity) => identity,
            Decision::Deny(err) => return deny(err),
        };

        let headers = match self.identity_headers(&identity) {
            Ok(headers) => headers,
            Err(err) => return deny(err),
        };

        info!(
            customer_id = %identity.tenant_id,
            account_id = %identity.account_id,
            user_id = %identity.user_id,
            "token verified; forwarding identity headers"
        );

        let body = AuthorizedBody {
            status: "authorized",
            expires_at: self.format_expiration(identity.exp),
            customer_id: identity.tenant_id,
            account_id: identity.account_id,
            user_id: identity.user_id,
        };
        (StatusCode::OK, headers, Json(body)).into_response()
    }

    pub fn identity_headers(&self, identity: &VerifiedIdentity) -> Result<HeaderMap, AuthError> {
        fn value(v: &str) -> Result<HeaderValue, AuthError> {
            HeaderValue::from_str(v).map_err(|_| {
                AuthError::MalformedToken("identity claims cannot be carried in headers")
            })
        }

        let mut headers = HeaderMap::new();
        headers.insert(X_CUSTOMER_ID.clone(), value(&identity.tenant_id)?);
        if !identity.account_id.is_empty() {
            headers.insert(X_ACCOUNT_ID.clone(), value(&identity.account_id)?);
        }
        if !identity.user_id.is_empty() {
            headers.insert(X_USER_ID.clone(), value(&identity.user_id)?);
        }
        headers.insert(X_TOKEN_VERIFIED.clone(), HeaderValue::from_static("true"));
        headers.insert(
            X_TOKEN_EXPIRATION.clone(),
            value(&self.format_expiration(identity.exp))?,
        );
        Ok(headers)
    }

    /// RFC 3339 in the display offset. The instant is the same whatever the offset.
    pub fn format_expiration(&self, exp: DateTime<Utc>) -> String {
        exp.with_timezone(&self.display_offset)
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Credential from `Authorization`, either raw or with an exact `"Bearer "` prefix.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedToken("Authorization header is not valid ASCII"))?;

    if value.is_empty() {
        return Err(AuthError::MissingHeader);
    }
    Ok(value.strip_prefix(BEARER_PREFIX).unwrap_or(value))
}

fn deny(err: AuthError) -> Response {
    warn!(code = err.code(), reason = %err, source = ?std::error::Error::source(&err), "denying request");

    let body = ErrorResponse {
        error: ErrorBody {
            code: err.code(),
            message: err.to_string(),
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::testing::{at, sign_claims, store_with};
    use chrono::Offset;
    use serde_json::{Value, json};

    const NOW: i64 = 1_700_000_000;

    async fn gateway(offset: FixedOffset) -> AuthorizationGateway {
        let store = store_with(&[("acme", "acme-secret", 60)]).await;
        AuthorizationGateway::new(Arc::new(TokenVerifier::new(store)), offset)
    }

    fn with_authorization(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("header"));
        headers
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[test]
    fn bearer_prefix_is_optional_and_case_sensitive() {
        assert_eq!(bearer_token(&with_authorization("Bearer abc")).expect("token"), "abc");
        assert_eq!(bearer_token(&with_authorization("abc")).expect("token"), "abc");
        assert_eq!(
            bearer_token(&with_authorization("bearer abc")).expect("token"),
            "bearer abc"
        );
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingHeader)
        ));
        assert!(matches!(
            bearer_token(&with_authorization("")),
            Err(AuthError::MissingHeader)
        ));
    }

    #[tokio::test]
    async fn missing_header_is_denied_with_reason() {
        let gw = gateway(Utc.fix()).await;
        let decision = gw.decide_at(&HeaderMap::new(), at(NOW)).await;
        assert!(matches!(decision, Decision::Deny(AuthError::MissingHeader)));

        let response = gw.render(decision);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(&X_TOKEN_VERIFIED).is_none());
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Authorization header required");
        assert_eq!(body["error"]["code"], "MISSING_HEADER");
    }

    #[tokio::test]
    async fn allow_carries_identity_headers() {
        let gw = gateway(Utc.fix()).await;
        let token = sign_claims("acme-secret", json!({"customerId": "acme", "exp": NOW + 60}));

        let decision = gw
            .decide_at(&with_authorization(&format!("Bearer {token}")), at(NOW))
            .await;
        let response = gw.render(decision);
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers[&X_CUSTOMER_ID], "acme");
        assert!(headers.get(&X_ACCOUNT_ID).is_none());
        assert!(headers.get(&X_USER_ID).is_none());
        assert_eq!(headers[&X_TOKEN_VERIFIED], "true");
        assert_eq!(headers[&X_TOKEN_EXPIRATION], "2023-11-14T22:14:20Z");

        let body = body_json(response).await;
        assert_eq!(body["status"], "authorized");
        assert_eq!(body["customer_id"], "acme");
        assert_eq!(body["account_id"], "");
        assert_eq!(body["expires_at"], "2023-11-14T22:14:20Z");
    }

    #[tokio::test]
    async fn optional_identity_headers_and_display_offset() {
        let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("offset");
        let gw = gateway(ist).await;
        let token = sign_claims(
            "acme-secret",
            json!({"customerId": "acme", "accountId": "acct-1", "userId": "u-1", "exp": NOW}),
        );

        let decision = gw.decide_at(&with_authorization(&token), at(NOW - 60)).await;
        let response = gw.render(decision);
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers[&X_ACCOUNT_ID], "acct-1");
        assert_eq!(headers[&X_USER_ID], "u-1");
        // Same instant as 2023-11-14T22:13:20Z.
        assert_eq!(headers[&X_TOKEN_EXPIRATION], "2023-11-15T03:43:20+05:30");
    }

    #[tokio::test]
    async fn verification_failure_is_denied_with_error_reason() {
        let gw = gateway(Utc.fix()).await;
        let token = sign_claims("acme-secret", json!({"customerId": "acme", "exp": NOW - 1}));

        let response = gw.render(gw.decide_at(&with_authorization(&token), at(NOW)).await);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(&X_CUSTOMER_ID).is_none());

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "EXPIRED");
        assert_eq!(body["error"]["message"], "token expired");
    }

    #[test]
    fn non_header_safe_claims_are_rejected() {
        let gw = AuthorizationGateway::new(
            Arc::new(TokenVerifier::new(Arc::new(
                crate::repos::memory::InMemoryTenantStore::new(),
            ))),
            Utc.fix(),
        );
        let identity = VerifiedIdentity {
            tenant_id: "acme".to_string(),
            account_id: String::new(),
            user_id: "line\nbreak".to_string(),
            exp: at(NOW),
        };
        assert!(matches!(
            gw.identity_headers(&identity),
            Err(AuthError::MalformedToken(_))
        ));
    }
}
