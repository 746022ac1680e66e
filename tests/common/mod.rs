use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use extauth::app::{build_router, build_state};
use extauth::config::Config;
use extauth::repos::CredentialStore;
use extauth::repos::memory::InMemoryTenantStore;
use extauth::services::tenants::{CreateTenant, TenantService};

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

/// In-memory store with `acme` (account `acct-1`, 60 min) and `globex` (no account, 5 min).
pub async fn seeded_store() -> Arc<dyn CredentialStore> {
    let store: Arc<dyn CredentialStore> = Arc::new(InMemoryTenantStore::new());
    let tenants = TenantService::new(store.clone());
    tenants
        .create(CreateTenant {
            tenant_id: "acme".to_string(),
            account_id: Some("acct-1".to_string()),
            default_ttl_minutes: 60,
        })
        .await
        .expect("acme");
    tenants
        .create(CreateTenant {
            tenant_id: "globex".to_string(),
            account_id: None,
            default_ttl_minutes: 5,
        })
        .await
        .expect("globex");
    store
}

pub fn app(store: Arc<dyn CredentialStore>, config: &Config) -> Router {
    build_router(build_state(store, config), config)
}
