use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub ttl_minutes: i32,
    /// RFC 3339, rendered in the configured display offset.
    pub expires_at: String,
}
