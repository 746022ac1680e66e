/*
 * Responsibility
 * - URL 構造を定義
 * - ext_authz 用の検証は CHECK_PREFIX 配下のみ (proxy の path_prefix と合わせる)
 *   proxy は元のパスを prefix の後ろに付けて問い合わせてくるので, 配下は全パス・全メソッドが検証対象
 * - /health, POST /token は検証面と重ならない (fallback で検証には落とさない)
 */
use axum::{
    Router,
    routing::{any, get, post},
};

use crate::api::handlers::{check::check, health::health, token::issue_token};
use crate::state::AppState;

/// Path prefix the fronting proxy prepends to every authorization check.
pub const CHECK_PREFIX: &str = "/authz";

pub fn routes(token_endpoint_enabled: bool) -> Router<AppState> {
    let check_routes = Router::new()
        .route(CHECK_PREFIX, any(check))
        .route(&format!("{CHECK_PREFIX}/"), any(check))
        .route(&format!("{CHECK_PREFIX}/{{*path}}"), any(check));

    let router = Router::new()
        .route("/health", get(health))
        .merge(check_routes);

    if token_endpoint_enabled {
        router.route("/token", post(issue_token))
    } else {
        router
    }
}
