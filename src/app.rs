/*
 * Responsibility
 * - tracing / panic hook の初期化
 * - Config → CredentialStore → services → AppState の組み立て
 * - Router 組み立て + middleware 適用, axum::serve() で起動
 */
use std::{panic, process, sync::Arc};

use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::{Config, ConfigError};
use crate::middleware;
use crate::repos::CredentialStore;
use crate::repos::memory::InMemoryTenantStore;
use crate::repos::tenant_repo::PgTenantRepo;
use crate::services::auth::{TokenIssuer, TokenVerifier};
use crate::services::gateway::AuthorizationGateway;
use crate::state::AppState;

pub fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,extauth=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    // stderr keeps CLI stdout clean for tokens and tables.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: fail fast. Production: default hook, keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn serve(config: Config) -> anyhow::Result<()> {
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting ext-authz gateway in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let store = build_store(&config).await?;
    let state = build_state(store, &config);
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Postgres when `DATABASE_URL` is set; otherwise the in-memory store, which
/// production refuses.
pub async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn CredentialStore>> {
    match &config.database_url {
        Some(url) => {
            let repo = PgTenantRepo::connect(
                url,
                config.db_max_connections,
                config.db_acquire_timeout,
            )
            .await?;
            tracing::info!(
                max_connections = config.db_max_connections,
                "connected to credential store"
            );
            Ok(Arc::new(repo))
        }
        None if config.app_env.is_production() => {
            Err(ConfigError::Missing("DATABASE_URL").into())
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory credential store (not durable)");
            Ok(Arc::new(InMemoryTenantStore::new()))
        }
    }
}

pub fn build_state(store: Arc<dyn CredentialStore>, config: &Config) -> AppState {
    let verifier = Arc::new(TokenVerifier::new(store.clone()));
    let gateway = AuthorizationGateway::new(verifier, config.display_offset);
    let issuer = Arc::new(TokenIssuer::new(store, config.display_offset));

    AppState::new(gateway, issuer)
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = api::routes(config.token_endpoint_enabled).with_state(state);

    middleware::http::apply(router, config.request_timeout)
}
