use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use crate::api::dto::{token_request::TokenRequest, token_response::TokenResponse};
use crate::error::AppError;
use crate::services::auth::IssueRequest;
use crate::state::AppState;

/// Administrative issuance: mint a token for a tenant.
pub async fn issue_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let Json(req) = payload?;
    let issued = state
        .issuer
        .issue(IssueRequest {
            tenant_id: req.tenant_id,
            ttl_minutes: req.ttl_minutes,
            account_id: req.account_id,
            user_id: req.user_id,
        })
        .await?;

    Ok((
        StatusCode::OK,
        Json(TokenResponse {
            token: issued.token,
            ttl_minutes: issued.ttl_minutes,
            expires_at: state.gateway.format_expiration(issued.expires_at),
        }),
    ))
}
