/*
 * Responsibility
 * - ext_authz の問い合わせ (任意メソッド / 任意パス)
 * - Authorization ヘッダ → 検証 → allow (200 + identity headers) / deny (401)
 */
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;

use crate::state::AppState;

pub async fn check(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let decision = state.gateway.decide(&headers).await;
    state.gateway.render(decision)
}
