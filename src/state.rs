/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::services::auth::TokenIssuer;
use crate::services::gateway::AuthorizationGateway;

#[derive(Clone, Debug)]
pub struct AppState {
    pub gateway: AuthorizationGateway,
    pub issuer: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(gateway: AuthorizationGateway, issuer: Arc<TokenIssuer>) -> Self {
        Self { gateway, issuer }
    }
}
