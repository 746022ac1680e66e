use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Claims written by the issuer.
#[derive(Debug, Serialize)]
pub(crate) struct IssuedClaims<'a> {
    #[serde(rename = "customerId")]
    pub customer_id: &'a str,
    #[serde(rename = "accountId", skip_serializing_if = "Option::is_none")]
    pub account_id: Option<&'a str>,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<&'a str>,
    pub exp: i64,
    pub iat: i64,
}

/// The only claim read before the signature is checked: it selects the key.
///
/// Everything else in the payload is ignored at this stage.
#[derive(Debug, Deserialize)]
pub(crate) struct KeySelector {
    #[serde(rename = "customerId")]
    pub customer_id: String,
}

/// Header fields inspected before verification.
#[derive(Debug, Deserialize)]
pub(crate) struct UnverifiedHeader {
    pub alg: String,
}

/// Claims decoded after the signature has been verified.
///
/// Optional identity claims must be strings when present; anything else is
/// rejected as malformed rather than probed.
#[derive(Debug, Deserialize)]
pub(crate) struct VerifiedClaims {
    #[serde(rename = "customerId")]
    pub customer_id: String,
    #[serde(rename = "accountId", default)]
    pub account_id: Option<String>,
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub exp: Option<i64>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub nbf: Option<i64>,
}

// NumericDate per RFC 7519: integers and floats are both valid; fractions are truncated.
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(value.and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))))
}

/// Identity established by a successful verification.
///
/// Absent optional claims are empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub tenant_id: String,
    pub account_id: String,
    pub user_id: String,
    pub exp: DateTime<Utc>,
}
