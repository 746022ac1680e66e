use serde::Deserialize;

/// Request body for `POST /token`.
///
/// `customer_id` / `minutes` are accepted for clients of the older API.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    #[serde(alias = "customer_id")]
    pub tenant_id: String,

    /// Defaults to the tenant's configured lifetime.
    #[serde(default, alias = "minutes")]
    pub ttl_minutes: Option<i32>,

    #[serde(default)]
    pub account_id: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,
}
